//! [`Datastore`] implementation over PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::NotSet, DatabaseConnection, DbErr, Set, SqlErr};
use tally_core::budget::{Budget, BudgetItem};
use tally_core::ledger::{Account, QueryOptions, Split, Transaction};
use tally_core::org::{Invite, Org};
use tally_core::price::Price;
use tally_core::store::{Datastore, StoreError, StoreResult};
use tally_shared::types::{AccountId, OrganizationId, PriceId, TransactionId, UserId};
use tracing::debug;

use crate::entities::{accounts, budget_items, invites, orgs, prices, splits, transactions};
use crate::repositories::account::SplitColumn;
use crate::repositories::transaction::TransactionWithSplits;
use crate::repositories::{
    AccountRepository, BudgetRepository, InviteRepository, OrgRepository, PriceRepository,
    TransactionRepository,
};

/// PostgreSQL-backed datastore built from the repositories.
#[derive(Debug, Clone)]
pub struct SeaDatastore {
    orgs: OrgRepository,
    invites: InviteRepository,
    accounts: AccountRepository,
    transactions: TransactionRepository,
    prices: PriceRepository,
    budgets: BudgetRepository,
}

impl SeaDatastore {
    /// Creates a datastore sharing one connection pool across repositories.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            orgs: OrgRepository::new(db.clone()),
            invites: InviteRepository::new(db.clone()),
            accounts: AccountRepository::new(db.clone()),
            transactions: TransactionRepository::new(db.clone()),
            prices: PriceRepository::new(db.clone()),
            budgets: BudgetRepository::new(db),
        }
    }
}

// ============================================================================
// Error & row mapping
// ============================================================================

fn db_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
        _ => StoreError::Database(err.to_string()),
    }
}

fn precision_from_row(value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative precision {value}")))
}

fn precision_to_row(value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("precision {value} out of range")))
}

fn org_from_row(row: orgs::Model) -> StoreResult<Org> {
    Ok(Org {
        id: row.id.into(),
        inserted: row.inserted,
        updated: row.updated,
        name: row.name,
        currency: row.currency,
        precision: precision_from_row(row.precision)?,
        timezone: row.timezone,
    })
}

fn org_to_row(org: &Org) -> StoreResult<orgs::ActiveModel> {
    Ok(orgs::ActiveModel {
        id: Set(org.id.into_inner()),
        inserted: Set(org.inserted),
        updated: Set(org.updated),
        name: Set(org.name.clone()),
        currency: Set(org.currency.clone()),
        precision: Set(precision_to_row(org.precision)?),
        timezone: Set(org.timezone.clone()),
    })
}

fn invite_from_row(row: invites::Model) -> Invite {
    Invite {
        id: row.id,
        org_id: row.org_id.into(),
        inserted: row.inserted,
        updated: row.updated,
        email: row.email,
        accepted: row.accepted,
    }
}

fn account_from_row(row: accounts::Model) -> StoreResult<Account> {
    Ok(Account {
        id: row.id.into(),
        org_id: row.org_id.into(),
        inserted: row.inserted,
        updated: row.updated,
        name: row.name,
        parent: row.parent_id.map(AccountId::from),
        currency: row.currency,
        precision: precision_from_row(row.precision)?,
        debit_balance: row.debit_balance,
        balance: None,
        native_balance: None,
        has_children: false,
        read_only: false,
    })
}

fn account_to_model(account: &Account) -> StoreResult<accounts::Model> {
    Ok(accounts::Model {
        id: account.id.into_inner(),
        org_id: account.org_id.into_inner(),
        inserted: account.inserted,
        updated: account.updated,
        name: account.name.clone(),
        parent_id: account.parent.map(AccountId::into_inner),
        currency: account.currency.clone(),
        precision: precision_to_row(account.precision)?,
        debit_balance: account.debit_balance,
    })
}

fn account_to_row(account: &Account) -> StoreResult<accounts::ActiveModel> {
    let model = account_to_model(account)?;
    Ok(accounts::ActiveModel {
        id: Set(model.id),
        org_id: Set(model.org_id),
        inserted: Set(model.inserted),
        updated: Set(model.updated),
        name: Set(model.name),
        parent_id: Set(model.parent_id),
        currency: Set(model.currency),
        precision: Set(model.precision),
        debit_balance: Set(model.debit_balance),
    })
}

fn transaction_from_rows((row, split_rows): TransactionWithSplits) -> Transaction {
    Transaction {
        id: row.id.into(),
        org_id: row.org_id.into(),
        user_id: row.user_id.into(),
        date: row.date,
        inserted: row.inserted,
        updated: row.updated,
        description: row.description,
        data: row.data,
        deleted: row.deleted,
        splits: split_rows
            .into_iter()
            .map(|s| Split {
                transaction_id: s.transaction_id.into(),
                account_id: s.account_id.into(),
                amount: s.amount,
                native_amount: s.native_amount,
            })
            .collect(),
    }
}

fn transaction_to_rows(
    transaction: &Transaction,
) -> (transactions::ActiveModel, Vec<splits::ActiveModel>) {
    let row = transactions::ActiveModel {
        id: Set(transaction.id.into_inner()),
        org_id: Set(transaction.org_id.into_inner()),
        user_id: Set(transaction.user_id.into_inner()),
        date: Set(transaction.date),
        inserted: Set(transaction.inserted),
        updated: Set(transaction.updated),
        description: Set(transaction.description.clone()),
        data: Set(transaction.data.clone()),
        deleted: Set(transaction.deleted),
    };

    let split_rows = transaction
        .splits
        .iter()
        .map(|s| splits::ActiveModel {
            id: NotSet,
            transaction_id: Set(transaction.id.into_inner()),
            account_id: Set(s.account_id.into_inner()),
            date: Set(transaction.date),
            inserted: Set(transaction.inserted),
            updated: Set(transaction.updated),
            amount: Set(s.amount),
            native_amount: Set(s.native_amount),
            deleted: Set(transaction.deleted),
        })
        .collect();

    (row, split_rows)
}

fn price_from_row(row: prices::Model) -> Price {
    Price {
        id: row.id.into(),
        org_id: row.org_id.into(),
        currency: row.currency,
        date: row.date,
        inserted: row.inserted,
        updated: row.updated,
        price: row.price,
    }
}

fn sums_to_map(rows: Vec<(uuid::Uuid, i64)>) -> HashMap<AccountId, i64> {
    rows.into_iter()
        .map(|(id, total)| (AccountId::from(id), total))
        .collect()
}

fn ids(account_ids: &[AccountId]) -> Vec<uuid::Uuid> {
    account_ids.iter().map(|id| id.into_inner()).collect()
}

// ============================================================================
// Datastore
// ============================================================================

#[async_trait]
impl Datastore for SeaDatastore {
    async fn create_org(
        &self,
        org: &Org,
        user_id: UserId,
        accounts: &[Account],
    ) -> StoreResult<()> {
        let root = accounts
            .iter()
            .find(|a| a.parent.is_none())
            .ok_or_else(|| StoreError::Corrupt(format!("org {} has no root account", org.id)))?;
        let rows = accounts
            .iter()
            .map(account_to_row)
            .collect::<StoreResult<Vec<_>>>()?;

        self.orgs
            .create_with_accounts(
                org_to_row(org)?,
                user_id.into_inner(),
                rows,
                root.id.into_inner(),
            )
            .await
            .map_err(db_err)
    }

    async fn update_org(&self, org: &Org) -> StoreResult<()> {
        self.orgs
            .update(org.id.into_inner(), &org.name, &org.timezone, org.updated)
            .await
            .map_err(db_err)
    }

    async fn get_org(&self, org_id: OrganizationId, user_id: UserId) -> StoreResult<Option<Org>> {
        self.orgs
            .find_for_member(org_id.into_inner(), user_id.into_inner())
            .await
            .map_err(db_err)?
            .map(org_from_row)
            .transpose()
    }

    async fn get_orgs(&self, user_id: UserId) -> StoreResult<Vec<Org>> {
        self.orgs
            .find_by_member(user_id.into_inner())
            .await
            .map_err(db_err)?
            .into_iter()
            .map(org_from_row)
            .collect()
    }

    async fn org_user_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>> {
        let ids = self
            .orgs
            .member_ids(org_id.into_inner(), false)
            .await
            .map_err(db_err)?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn org_admin_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>> {
        let ids = self
            .orgs
            .member_ids(org_id.into_inner(), true)
            .await
            .map_err(db_err)?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn insert_invite(&self, invite: &Invite) -> StoreResult<()> {
        self.invites
            .insert(invites::ActiveModel {
                id: Set(invite.id.clone()),
                org_id: Set(invite.org_id.into_inner()),
                inserted: Set(invite.inserted),
                updated: Set(invite.updated),
                email: Set(invite.email.clone()),
                accepted: Set(invite.accepted),
            })
            .await
            .map_err(db_err)
    }

    async fn get_invite(&self, id: &str) -> StoreResult<Option<Invite>> {
        Ok(self
            .invites
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .map(invite_from_row))
    }

    async fn get_invites(&self, org_id: OrganizationId) -> StoreResult<Vec<Invite>> {
        Ok(self
            .invites
            .find_by_org(org_id.into_inner())
            .await
            .map_err(db_err)?
            .into_iter()
            .map(invite_from_row)
            .collect())
    }

    async fn accept_invite(&self, invite: &Invite, user_id: UserId) -> StoreResult<()> {
        self.invites
            .accept(
                &invite.id,
                invite.org_id.into_inner(),
                user_id.into_inner(),
                invite.updated,
            )
            .await
            .map_err(|err| match err {
                DbErr::RecordNotFound(what) => StoreError::Corrupt(format!("missing {what}")),
                other => db_err(other),
            })
    }

    async fn delete_invite(&self, id: &str) -> StoreResult<()> {
        self.invites.delete(id).await.map_err(db_err)
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .insert(account_to_row(account)?)
            .await
            .map_err(db_err)
    }

    async fn update_account(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .update(&account_to_model(account)?)
            .await
            .map_err(db_err)
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.accounts
            .find_by_id(id.into_inner())
            .await
            .map_err(db_err)?
            .map(account_from_row)
            .transpose()
    }

    async fn accounts_by_org(&self, org_id: OrganizationId) -> StoreResult<Vec<Account>> {
        self.accounts
            .find_by_org(org_id.into_inner())
            .await
            .map_err(db_err)?
            .into_iter()
            .map(account_from_row)
            .collect()
    }

    async fn permissioned_account_ids(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Vec<AccountId>> {
        let ids = self
            .accounts
            .permissioned_ids(org_id.into_inner(), user_id.into_inner())
            .await
            .map_err(db_err)?;
        Ok(ids.into_iter().map(AccountId::from).collect())
    }

    async fn split_count(&self, account_id: AccountId) -> StoreResult<u64> {
        self.accounts
            .split_count(account_id.into_inner())
            .await
            .map_err(db_err)
    }

    async fn child_count(&self, account_id: AccountId) -> StoreResult<u64> {
        self.accounts
            .child_count(account_id.into_inner())
            .await
            .map_err(db_err)
    }

    async fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        self.accounts.delete(id.into_inner()).await.map_err(db_err)
    }

    async fn sum_split_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>> {
        let rows = self
            .accounts
            .sum_splits(&ids(account_ids), before, SplitColumn::Amount)
            .await
            .map_err(db_err)?;
        Ok(sums_to_map(rows))
    }

    async fn sum_split_native_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>> {
        let rows = self
            .accounts
            .sum_splits(&ids(account_ids), before, SplitColumn::NativeAmount)
            .await
            .map_err(db_err)?;
        Ok(sums_to_map(rows))
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let (row, split_rows) = transaction_to_rows(transaction);
        self.transactions
            .insert(row, split_rows)
            .await
            .map_err(db_err)
    }

    async fn get_transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self
            .transactions
            .find_by_id(id.into_inner())
            .await
            .map_err(db_err)?
            .map(transaction_from_rows))
    }

    async fn transactions_by_account(
        &self,
        account_id: AccountId,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .transactions
            .find_by_accounts(None, &[account_id.into_inner()], options)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(transaction_from_rows)
            .collect())
    }

    async fn transactions_by_org(
        &self,
        org_id: OrganizationId,
        options: &QueryOptions,
        account_ids: &[AccountId],
    ) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .transactions
            .find_by_accounts(Some(org_id.into_inner()), &ids(account_ids), options)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(transaction_from_rows)
            .collect())
    }

    async fn delete_transaction(
        &self,
        id: TransactionId,
        updated: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.transactions
            .soft_delete(id.into_inner(), updated)
            .await
            .map_err(db_err)
    }

    async fn replace_transaction(
        &self,
        old_id: TransactionId,
        replacement: &Transaction,
    ) -> StoreResult<()> {
        debug!(%old_id, new_id = %replacement.id, "replacing transaction");
        let (row, split_rows) = transaction_to_rows(replacement);
        self.transactions
            .replace(old_id.into_inner(), row, split_rows, replacement.updated)
            .await
            .map_err(db_err)
    }

    async fn insert_price(&self, price: &Price) -> StoreResult<()> {
        self.prices
            .insert(prices::ActiveModel {
                id: Set(price.id.into_inner()),
                org_id: Set(price.org_id.into_inner()),
                currency: Set(price.currency.clone()),
                date: Set(price.date),
                inserted: Set(price.inserted),
                updated: Set(price.updated),
                price: Set(price.price),
            })
            .await
            .map_err(db_err)
    }

    async fn get_price(&self, id: PriceId) -> StoreResult<Option<Price>> {
        Ok(self
            .prices
            .find_by_id(id.into_inner())
            .await
            .map_err(db_err)?
            .map(price_from_row))
    }

    async fn delete_price(&self, id: PriceId) -> StoreResult<()> {
        self.prices.delete(id.into_inner()).await.map_err(db_err)
    }

    async fn nearest_price(
        &self,
        org_id: OrganizationId,
        currency: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Option<Price>> {
        Ok(self
            .prices
            .find_nearest(org_id.into_inner(), currency, as_of)
            .await
            .map_err(db_err)?
            .map(price_from_row))
    }

    async fn prices_nearest_in_time(
        &self,
        org_id: OrganizationId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Price>> {
        Ok(self
            .prices
            .find_nearest_per_currency(org_id.into_inner(), date)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(price_from_row)
            .collect())
    }

    async fn prices_by_currency(
        &self,
        org_id: OrganizationId,
        currency: &str,
    ) -> StoreResult<Vec<Price>> {
        Ok(self
            .prices
            .find_by_currency(org_id.into_inner(), currency)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(price_from_row)
            .collect())
    }

    async fn get_budget(&self, org_id: OrganizationId) -> StoreResult<Option<Budget>> {
        let rows = self
            .budgets
            .find_by_org(org_id.into_inner())
            .await
            .map_err(db_err)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        Ok(Some(Budget {
            org_id,
            inserted: first.inserted,
            items: rows
                .iter()
                .map(|row| BudgetItem {
                    account_id: row.account_id.into(),
                    amount: row.amount,
                })
                .collect(),
        }))
    }

    async fn replace_budget(&self, budget: &Budget) -> StoreResult<()> {
        let items = budget
            .items
            .iter()
            .map(|item| budget_items::ActiveModel {
                id: NotSet,
                org_id: Set(budget.org_id.into_inner()),
                account_id: Set(item.account_id.into_inner()),
                inserted: Set(budget.inserted),
                amount: Set(item.amount),
            })
            .collect();

        self.budgets
            .replace(budget.org_id.into_inner(), items)
            .await
            .map_err(db_err)
    }

    async fn delete_budget(&self, org_id: OrganizationId) -> StoreResult<()> {
        self.budgets
            .delete(org_id.into_inner())
            .await
            .map_err(db_err)
    }
}
