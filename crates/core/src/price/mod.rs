//! Exchange prices between foreign currencies and an org's currency.

pub mod service;
pub mod types;

pub use types::Price;
