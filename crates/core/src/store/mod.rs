//! Persistence gateway contract.
//!
//! The ledger core never talks to a database directly. Every read and write
//! goes through [`Datastore`], which the SQL crate implements over SeaORM and
//! [`MemoryDatastore`] implements for tests and tooling.
//!
//! Methods that touch more than one row (`create_org`, `accept_invite`,
//! `insert_transaction`, `replace_transaction`, `delete_transaction`,
//! `replace_budget`) must be atomic: either every row changes or none does.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, OrganizationId, PriceId, TransactionId, UserId};
use thiserror::Error;

use crate::budget::Budget;
use crate::ledger::query::QueryOptions;
use crate::ledger::types::{Account, Transaction};
use crate::org::types::{Invite, Org};
use crate::price::Price;

pub use memory::MemoryDatastore;

/// Errors raised by a [`Datastore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A row with the same key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result alias for datastore calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract persistence gateway consumed by the ledger services.
#[async_trait]
pub trait Datastore: Send + Sync {
    // ========== Organizations ==========

    /// Inserts the org, makes `user_id` an admin member, inserts the seed
    /// accounts and grants `user_id` write permission on the root account.
    async fn create_org(
        &self,
        org: &Org,
        user_id: UserId,
        accounts: &[Account],
    ) -> StoreResult<()>;

    /// Updates name, timezone and `updated` of an org. Currency and precision
    /// are fixed at creation.
    async fn update_org(&self, org: &Org) -> StoreResult<()>;

    /// Loads an org visible to `user_id` (the user must be a member).
    async fn get_org(&self, org_id: OrganizationId, user_id: UserId) -> StoreResult<Option<Org>>;

    /// Lists every org `user_id` belongs to, ordered by name.
    async fn get_orgs(&self, user_id: UserId) -> StoreResult<Vec<Org>>;

    /// All member user ids of an org.
    async fn org_user_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>>;

    /// Member user ids holding the admin flag.
    async fn org_admin_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>>;

    // ========== Invites ==========

    /// Stores a new invite.
    async fn insert_invite(&self, invite: &Invite) -> StoreResult<()>;

    /// Loads an invite by its short id.
    async fn get_invite(&self, id: &str) -> StoreResult<Option<Invite>>;

    /// Lists the invites of an org.
    async fn get_invites(&self, org_id: OrganizationId) -> StoreResult<Vec<Invite>>;

    /// Marks the invite accepted, adds `user_id` as a non-admin member and
    /// grants write permission on the org's root account.
    async fn accept_invite(&self, invite: &Invite, user_id: UserId) -> StoreResult<()>;

    /// Removes an invite.
    async fn delete_invite(&self, id: &str) -> StoreResult<()>;

    // ========== Accounts ==========

    /// Stores a new account.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    /// Persists name, parent, currency, precision, debit flag and `updated`.
    async fn update_account(&self, account: &Account) -> StoreResult<()>;

    /// Loads one account.
    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Every account of an org, in insertion order.
    async fn accounts_by_org(&self, org_id: OrganizationId) -> StoreResult<Vec<Account>>;

    /// Account ids `user_id` holds an explicit write grant on.
    async fn permissioned_account_ids(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Vec<AccountId>>;

    /// Number of non-deleted splits posted to the account.
    async fn split_count(&self, account_id: AccountId) -> StoreResult<u64>;

    /// Number of direct children of the account.
    async fn child_count(&self, account_id: AccountId) -> StoreResult<u64>;

    /// Hard-deletes an account row.
    async fn delete_account(&self, id: AccountId) -> StoreResult<()>;

    /// Sums `amount` of non-deleted splits dated strictly before `before`,
    /// grouped by account. Accounts without splits are absent from the map.
    async fn sum_split_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>>;

    /// Same as [`Datastore::sum_split_amounts`] over `native_amount`.
    async fn sum_split_native_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>>;

    // ========== Transactions ==========

    /// Inserts a transaction and its splits.
    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()>;

    /// Loads a transaction with its splits, deleted or not.
    async fn get_transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>>;

    /// Transactions with at least one split on `account_id`.
    async fn transactions_by_account(
        &self,
        account_id: AccountId,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Transaction>>;

    /// Transactions of an org with at least one split on `account_ids`.
    async fn transactions_by_org(
        &self,
        org_id: OrganizationId,
        options: &QueryOptions,
        account_ids: &[AccountId],
    ) -> StoreResult<Vec<Transaction>>;

    /// Soft-deletes a transaction and its splits, stamping `updated`.
    async fn delete_transaction(
        &self,
        id: TransactionId,
        updated: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Soft-deletes `old_id` (stamped with the replacement's `updated`) and
    /// inserts `replacement`.
    async fn replace_transaction(
        &self,
        old_id: TransactionId,
        replacement: &Transaction,
    ) -> StoreResult<()>;

    // ========== Prices ==========

    /// Stores a new price.
    async fn insert_price(&self, price: &Price) -> StoreResult<()>;

    /// Loads one price.
    async fn get_price(&self, id: PriceId) -> StoreResult<Option<Price>>;

    /// Removes a price.
    async fn delete_price(&self, id: PriceId) -> StoreResult<()>;

    /// The price of `currency` whose date is closest to `as_of`.
    async fn nearest_price(
        &self,
        org_id: OrganizationId,
        currency: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Option<Price>>;

    /// One price per currency, each the closest to `date`.
    async fn prices_nearest_in_time(
        &self,
        org_id: OrganizationId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Price>>;

    /// Every price of `currency`, date ascending.
    async fn prices_by_currency(
        &self,
        org_id: OrganizationId,
        currency: &str,
    ) -> StoreResult<Vec<Price>>;

    // ========== Budget ==========

    /// Loads the org's budget, `None` when it has no items.
    async fn get_budget(&self, org_id: OrganizationId) -> StoreResult<Option<Budget>>;

    /// Deletes every item of the org's budget and inserts the new ones.
    async fn replace_budget(&self, budget: &Budget) -> StoreResult<()>;

    /// Deletes every item of the org's budget.
    async fn delete_budget(&self, org_id: OrganizationId) -> StoreResult<()>;
}
