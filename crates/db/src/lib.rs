//! PostgreSQL persistence for the ledger.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories over those entities
//! - [`SeaDatastore`], the ledger's [`tally_core::store::Datastore`] backed by them
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;
mod store;

pub use repositories::{
    AccountRepository, BudgetRepository, InviteRepository, OrgRepository, PriceRepository,
    TransactionRepository,
};
pub use store::SeaDatastore;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized by the given limits.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
