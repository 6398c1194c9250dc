//! In-memory [`Datastore`] for tests and tooling.
//!
//! All state lives behind one `RwLock`; every multi-row write happens inside
//! a single write guard, which gives the same all-or-nothing behavior the SQL
//! store gets from a database transaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, OrganizationId, PriceId, TransactionId, UserId};

use super::{Datastore, StoreError, StoreResult};
use crate::budget::Budget;
use crate::ledger::query::QueryOptions;
use crate::ledger::types::{Account, Split, Transaction};
use crate::org::types::{Invite, Org};
use crate::price::Price;

#[derive(Debug, Clone, Copy)]
struct Membership {
    org_id: OrganizationId,
    user_id: UserId,
    admin: bool,
}

#[derive(Debug, Clone, Copy)]
struct Permission {
    org_id: OrganizationId,
    user_id: UserId,
    account_id: AccountId,
}

#[derive(Debug, Default)]
struct State {
    orgs: Vec<Org>,
    members: Vec<Membership>,
    permissions: Vec<Permission>,
    invites: Vec<Invite>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    prices: Vec<Price>,
    budgets: HashMap<OrganizationId, Budget>,
}

impl State {
    fn is_member(&self, org_id: OrganizationId, user_id: UserId) -> bool {
        self.members
            .iter()
            .any(|m| m.org_id == org_id && m.user_id == user_id)
    }

    fn root_of(&self, org_id: OrganizationId) -> Option<AccountId> {
        self.accounts
            .iter()
            .find(|a| a.org_id == org_id && a.parent.is_none())
            .map(|a| a.id)
    }

    fn grant(&mut self, org_id: OrganizationId, user_id: UserId, account_id: AccountId) {
        let exists = self.permissions.iter().any(|p| {
            p.org_id == org_id && p.user_id == user_id && p.account_id == account_id
        });
        if !exists {
            self.permissions.push(Permission {
                org_id,
                user_id,
                account_id,
            });
        }
    }

    fn sum_splits(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
        amount: impl Fn(&Split) -> i64,
    ) -> StoreResult<HashMap<AccountId, i64>> {
        let mut totals: HashMap<AccountId, i128> = HashMap::new();
        for tx in self
            .transactions
            .iter()
            .filter(|tx| !tx.deleted && tx.date < before)
        {
            for split in tx
                .splits
                .iter()
                .filter(|s| account_ids.contains(&s.account_id))
            {
                *totals.entry(split.account_id).or_default() += i128::from(amount(split));
            }
        }
        totals
            .into_iter()
            .map(|(id, total)| {
                i64::try_from(total)
                    .map(|total| (id, total))
                    .map_err(|_| StoreError::Corrupt(format!("balance of account {id} overflows")))
            })
            .collect()
    }
}

/// Stores everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    state: RwLock<State>,
}

impl MemoryDatastore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    /// Adds a non-admin member holding exactly `grants`.
    #[cfg(test)]
    pub(crate) fn add_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
        grants: &[AccountId],
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        state.members.push(Membership {
            org_id,
            user_id,
            admin: false,
        });
        for account_id in grants {
            state.grant(org_id, user_id, *account_id);
        }
        Ok(())
    }
}

// Computed account fields are never persisted.
fn stored(account: &Account) -> Account {
    Account {
        balance: None,
        native_balance: None,
        has_children: false,
        read_only: false,
        ..account.clone()
    }
}

fn distance_millis(a: DateTime<Utc>, b: DateTime<Utc>) -> u64 {
    (a - b).num_milliseconds().unsigned_abs()
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn create_org(
        &self,
        org: &Org,
        user_id: UserId,
        accounts: &[Account],
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.orgs.iter().any(|o| o.id == org.id) {
            return Err(StoreError::Duplicate(format!("org {}", org.id)));
        }
        if let Some(dup) = accounts
            .iter()
            .find(|a| state.accounts.iter().any(|b| b.id == a.id))
        {
            return Err(StoreError::Duplicate(format!("account {}", dup.id)));
        }

        state.orgs.push(org.clone());
        state.members.push(Membership {
            org_id: org.id,
            user_id,
            admin: true,
        });
        state.accounts.extend(accounts.iter().map(stored));
        if let Some(root) = state.root_of(org.id) {
            state.grant(org.id, user_id, root);
        }
        Ok(())
    }

    async fn update_org(&self, org: &Org) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(existing) = state.orgs.iter_mut().find(|o| o.id == org.id) {
            existing.name.clone_from(&org.name);
            existing.timezone.clone_from(&org.timezone);
            existing.updated = org.updated;
        }
        Ok(())
    }

    async fn get_org(&self, org_id: OrganizationId, user_id: UserId) -> StoreResult<Option<Org>> {
        let state = self.read()?;
        if !state.is_member(org_id, user_id) {
            return Ok(None);
        }
        Ok(state.orgs.iter().find(|o| o.id == org_id).cloned())
    }

    async fn get_orgs(&self, user_id: UserId) -> StoreResult<Vec<Org>> {
        let state = self.read()?;
        let mut orgs: Vec<Org> = state
            .orgs
            .iter()
            .filter(|o| state.is_member(o.id, user_id))
            .cloned()
            .collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(orgs)
    }

    async fn org_user_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>> {
        let state = self.read()?;
        Ok(state
            .members
            .iter()
            .filter(|m| m.org_id == org_id)
            .map(|m| m.user_id)
            .collect())
    }

    async fn org_admin_ids(&self, org_id: OrganizationId) -> StoreResult<Vec<UserId>> {
        let state = self.read()?;
        Ok(state
            .members
            .iter()
            .filter(|m| m.org_id == org_id && m.admin)
            .map(|m| m.user_id)
            .collect())
    }

    async fn insert_invite(&self, invite: &Invite) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.invites.iter().any(|i| i.id == invite.id) {
            return Err(StoreError::Duplicate(format!("invite {}", invite.id)));
        }
        state.invites.push(invite.clone());
        Ok(())
    }

    async fn get_invite(&self, id: &str) -> StoreResult<Option<Invite>> {
        Ok(self.read()?.invites.iter().find(|i| i.id == id).cloned())
    }

    async fn get_invites(&self, org_id: OrganizationId) -> StoreResult<Vec<Invite>> {
        Ok(self
            .read()?
            .invites
            .iter()
            .filter(|i| i.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn accept_invite(&self, invite: &Invite, user_id: UserId) -> StoreResult<()> {
        let mut state = self.write()?;
        let root = state.root_of(invite.org_id).ok_or_else(|| {
            StoreError::Corrupt(format!("org {} has no root account", invite.org_id))
        })?;
        let Some(entry) = state.invites.iter_mut().find(|i| i.id == invite.id) else {
            return Err(StoreError::Corrupt(format!("invite {} vanished", invite.id)));
        };
        entry.accepted = true;
        entry.updated = invite.updated;

        if !state.is_member(invite.org_id, user_id) {
            state.members.push(Membership {
                org_id: invite.org_id,
                user_id,
                admin: false,
            });
        }
        state.grant(invite.org_id, user_id, root);
        Ok(())
    }

    async fn delete_invite(&self, id: &str) -> StoreResult<()> {
        self.write()?.invites.retain(|i| i.id != id);
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.accounts.iter().any(|a| a.id == account.id) {
            return Err(StoreError::Duplicate(format!("account {}", account.id)));
        }
        state.accounts.push(stored(account));
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(existing) = state.accounts.iter_mut().find(|a| a.id == account.id) {
            existing.name.clone_from(&account.name);
            existing.parent = account.parent;
            existing.currency.clone_from(&account.currency);
            existing.precision = account.precision;
            existing.debit_balance = account.debit_balance;
            existing.updated = account.updated;
        }
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn accounts_by_org(&self, org_id: OrganizationId) -> StoreResult<Vec<Account>> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|a| a.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn permissioned_account_ids(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Vec<AccountId>> {
        Ok(self
            .read()?
            .permissions
            .iter()
            .filter(|p| p.org_id == org_id && p.user_id == user_id)
            .map(|p| p.account_id)
            .collect())
    }

    async fn split_count(&self, account_id: AccountId) -> StoreResult<u64> {
        let state = self.read()?;
        let count = state
            .transactions
            .iter()
            .filter(|tx| !tx.deleted)
            .flat_map(|tx| &tx.splits)
            .filter(|s| s.account_id == account_id)
            .count();
        Ok(count as u64)
    }

    async fn child_count(&self, account_id: AccountId) -> StoreResult<u64> {
        let state = self.read()?;
        let count = state
            .accounts
            .iter()
            .filter(|a| a.parent == Some(account_id))
            .count();
        Ok(count as u64)
    }

    async fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.accounts.retain(|a| a.id != id);
        state.permissions.retain(|p| p.account_id != id);
        Ok(())
    }

    async fn sum_split_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>> {
        self.read()?.sum_splits(account_ids, before, |s| s.amount)
    }

    async fn sum_split_native_amounts(
        &self,
        account_ids: &[AccountId],
        before: DateTime<Utc>,
    ) -> StoreResult<HashMap<AccountId, i64>> {
        self.read()?
            .sum_splits(account_ids, before, |s| s.native_amount)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.transactions.iter().any(|t| t.id == transaction.id) {
            return Err(StoreError::Duplicate(format!(
                "transaction {}",
                transaction.id
            )));
        }
        state.transactions.push(transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.read()?.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn transactions_by_account(
        &self,
        account_id: AccountId,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Transaction>> {
        let state = self.read()?;
        Ok(options.apply(
            state
                .transactions
                .iter()
                .filter(|tx| tx.account_ids().any(|id| id == account_id))
                .cloned(),
        ))
    }

    async fn transactions_by_org(
        &self,
        org_id: OrganizationId,
        options: &QueryOptions,
        account_ids: &[AccountId],
    ) -> StoreResult<Vec<Transaction>> {
        let state = self.read()?;
        Ok(options.apply(
            state
                .transactions
                .iter()
                .filter(|tx| tx.org_id == org_id)
                .filter(|tx| tx.account_ids().any(|id| account_ids.contains(&id)))
                .cloned(),
        ))
    }

    async fn delete_transaction(
        &self,
        id: TransactionId,
        updated: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(tx) = state.transactions.iter_mut().find(|t| t.id == id) {
            tx.deleted = true;
            tx.updated = updated;
        }
        Ok(())
    }

    async fn replace_transaction(
        &self,
        old_id: TransactionId,
        replacement: &Transaction,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.transactions.iter().any(|t| t.id == replacement.id) {
            return Err(StoreError::Duplicate(format!(
                "transaction {}",
                replacement.id
            )));
        }
        if let Some(tx) = state.transactions.iter_mut().find(|t| t.id == old_id) {
            tx.deleted = true;
            tx.updated = replacement.updated;
        }
        state.transactions.push(replacement.clone());
        Ok(())
    }

    async fn insert_price(&self, price: &Price) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.prices.iter().any(|p| p.id == price.id) {
            return Err(StoreError::Duplicate(format!("price {}", price.id)));
        }
        state.prices.push(price.clone());
        Ok(())
    }

    async fn get_price(&self, id: PriceId) -> StoreResult<Option<Price>> {
        Ok(self.read()?.prices.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_price(&self, id: PriceId) -> StoreResult<()> {
        self.write()?.prices.retain(|p| p.id != id);
        Ok(())
    }

    async fn nearest_price(
        &self,
        org_id: OrganizationId,
        currency: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Option<Price>> {
        let state = self.read()?;
        Ok(state
            .prices
            .iter()
            .filter(|p| p.org_id == org_id && p.currency == currency)
            .min_by_key(|p| (distance_millis(p.date, as_of), p.date))
            .cloned())
    }

    async fn prices_nearest_in_time(
        &self,
        org_id: OrganizationId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Price>> {
        let state = self.read()?;
        let mut nearest: BTreeMap<&str, &Price> = BTreeMap::new();
        for price in state.prices.iter().filter(|p| p.org_id == org_id) {
            let key = (distance_millis(price.date, date), price.date);
            nearest
                .entry(price.currency.as_str())
                .and_modify(|best| {
                    if key < (distance_millis(best.date, date), best.date) {
                        *best = price;
                    }
                })
                .or_insert(price);
        }
        Ok(nearest.into_values().cloned().collect())
    }

    async fn prices_by_currency(
        &self,
        org_id: OrganizationId,
        currency: &str,
    ) -> StoreResult<Vec<Price>> {
        let state = self.read()?;
        let mut prices: Vec<Price> = state
            .prices
            .iter()
            .filter(|p| p.org_id == org_id && p.currency == currency)
            .cloned()
            .collect();
        prices.sort_by_key(|p| p.date);
        Ok(prices)
    }

    async fn get_budget(&self, org_id: OrganizationId) -> StoreResult<Option<Budget>> {
        Ok(self
            .read()?
            .budgets
            .get(&org_id)
            .filter(|b| !b.items.is_empty())
            .cloned())
    }

    async fn replace_budget(&self, budget: &Budget) -> StoreResult<()> {
        self.write()?.budgets.insert(budget.org_id, budget.clone());
        Ok(())
    }

    async fn delete_budget(&self, org_id: OrganizationId) -> StoreResult<()> {
        self.write()?.budgets.remove(&org_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (MemoryDatastore, Org, UserId, Vec<Account>) {
        let store = MemoryDatastore::new();
        let org = Org::new("Acme", "USD", 2);
        let user = UserId::new();
        let accounts = org.standard_accounts(Utc::now());
        store.create_org(&org, user, &accounts).await.unwrap();
        (store, org, user, accounts)
    }

    #[tokio::test]
    async fn test_create_org_grants_root() {
        let (store, org, user, accounts) = seeded().await;
        assert_eq!(store.org_admin_ids(org.id).await.unwrap(), vec![user]);
        assert_eq!(
            store.permissioned_account_ids(org.id, user).await.unwrap(),
            vec![accounts[0].id]
        );
        assert!(store.get_org(org.id, UserId::new()).await.unwrap().is_none());
        assert_eq!(store.accounts_by_org(org.id).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_create_org_is_all_or_nothing() {
        let (store, _, user, accounts) = seeded().await;
        let other = Org::new("Other", "EUR", 2);
        // reusing an existing account id must leave nothing behind
        let err = store.create_org(&other, user, &accounts).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(store.get_org(other.id, user).await.unwrap().is_none());
        assert!(store.accounts_by_org(other.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_transaction_soft_deletes_old() {
        let (store, org, _, accounts) = seeded().await;
        let (a, b) = (accounts[1].id, accounts[2].id);
        let mut old = Transaction::new(org.id, "old", vec![Split::new(a, 5, 5), Split::new(b, -5, -5)]);
        old.date = Utc::now() - Duration::days(1);
        store.insert_transaction(&old).await.unwrap();

        let mut new = old.clone();
        new.id = TransactionId::new();
        new.updated = Utc::now();
        store.replace_transaction(old.id, &new).await.unwrap();

        let stale = store.get_transaction(old.id).await.unwrap().unwrap();
        assert!(stale.deleted);
        assert_eq!(stale.updated, new.updated);
        assert_eq!(store.split_count(a).await.unwrap(), 1);

        // replacing with an existing id changes nothing
        let err = store.replace_transaction(new.id, &new).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(!store.get_transaction(new.id).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn test_nearest_price_prefers_earlier_on_tie() {
        let (store, org, _, _) = seeded().await;
        let now = Utc::now();
        let mut before = Price::new(org.id, "EUR", 1.0);
        before.date = now - Duration::days(1);
        let mut after = Price::new(org.id, "EUR", 2.0);
        after.date = now + Duration::days(1);
        let mut other = Price::new(org.id, "GBP", 3.0);
        other.date = now;
        for p in [&after, &before, &other] {
            store.insert_price(p).await.unwrap();
        }

        let nearest = store.nearest_price(org.id, "EUR", now).await.unwrap().unwrap();
        assert_eq!(nearest.id, before.id);

        let listed = store.prices_nearest_in_time(org.id, now).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![before.id, other.id]);

        let by_currency = store.prices_by_currency(org.id, "EUR").await.unwrap();
        assert_eq!(by_currency.iter().map(|p| p.id).collect::<Vec<_>>(), vec![before.id, after.id]);
    }

    #[tokio::test]
    async fn test_empty_budget_is_absent() {
        let (store, org, _, _) = seeded().await;
        store.replace_budget(&Budget::new(org.id, vec![])).await.unwrap();
        assert!(store.get_budget(org.id).await.unwrap().is_none());
    }
}
