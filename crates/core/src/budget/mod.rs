//! Per-org budgets.

pub mod service;
pub mod types;

pub use types::{Budget, BudgetItem};
