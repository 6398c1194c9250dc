//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence goes through the [`store::Datastore`] contract and change events
//! through [`notify::NotificationSink`].
//!
//! # Modules
//!
//! - `ledger` - Accounts, transactions, balances and the `LedgerService`
//! - `org` - Organizations, membership and invites
//! - `price` - Exchange prices
//! - `budget` - Per-org budgets
//! - `store` - Persistence contract and in-memory implementation
//! - `notify` - Change notifications

pub mod budget;
pub mod ledger;
pub mod notify;
pub mod org;
pub mod price;
pub mod store;

#[cfg(test)]
mod testing;
