//! Repository abstractions for data access.
//!
//! Repositories speak in entity models and [`sea_orm::DbErr`]; the
//! [`crate::SeaDatastore`] adapter maps them onto the ledger's domain types.

pub mod account;
pub mod budget;
pub mod invite;
pub mod org;
pub mod price;
pub mod transaction;

pub use account::AccountRepository;
pub use budget::BudgetRepository;
pub use invite::InviteRepository;
pub use org::OrgRepository;
pub use price::PriceRepository;
pub use transaction::TransactionRepository;
