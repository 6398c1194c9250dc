//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Account, transaction and split types
//! - Account hierarchy and permission resolution
//! - Split validation (zero-sum, leaf accounts, native amounts)
//! - Balance calculation, including multi-currency conversion
//! - Transaction listing options
//! - `LedgerService`, the entry point for every operation

pub mod accounts;
pub mod balance;
pub mod error;
pub mod hierarchy;
pub mod query;
pub mod service;
pub mod transactions;
pub mod types;
pub mod validation;

#[cfg(test)]
mod hierarchy_props;
#[cfg(test)]
mod validation_props;

pub use balance::{BalanceCalculator, convert_to_native};
pub use error::{ErrorKind, LedgerError};
pub use hierarchy::{AccountTree, resolve};
pub use query::{QueryOptions, SortOrder};
pub use service::LedgerService;
pub use types::{Account, Split, Transaction, TransactionTransition};
pub use validation::validate_splits;
