//! Chart-of-accounts operations.

use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, OrganizationId, UserId};
use tracing::info;

use super::error::LedgerError;
use super::hierarchy::has_write_access;
use super::service::LedgerService;
use super::types::Account;
use crate::notify::{Action, Payload};

fn check_required(account: &Account) -> Result<(), LedgerError> {
    if account.id.is_nil() {
        return Err(LedgerError::MissingField("id"));
    }
    if account.org_id.is_nil() {
        return Err(LedgerError::MissingField("orgId"));
    }
    if account.name.is_empty() {
        return Err(LedgerError::MissingField("name"));
    }
    if account.currency.is_empty() {
        return Err(LedgerError::MissingField("currency"));
    }
    Ok(())
}

impl LedgerService {
    /// Accounts visible to the caller, sorted by name.
    pub async fn get_accounts(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Account>, LedgerError> {
        self.require_member(org_id, user_id).await?;
        self.accessible_accounts(org_id, user_id).await
    }

    /// Visible accounts with balance and cost-basis native balance as of `as_of`.
    pub async fn get_accounts_with_balances(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.get_accounts(org_id, user_id).await?;
        let calc = self.balances();
        calc.add_balances(&mut accounts, as_of).await?;
        calc.add_native_balances_cost(&mut accounts, as_of).await?;
        Ok(accounts)
    }

    /// One visible account.
    pub async fn get_account(
        &self,
        org_id: OrganizationId,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Account, LedgerError> {
        self.get_accounts(org_id, user_id)
            .await?
            .into_iter()
            .find(|a| a.id == account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// One visible account with balances as of `as_of`.
    pub async fn get_account_with_balance(
        &self,
        org_id: OrganizationId,
        account_id: AccountId,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let mut account = self.get_account(org_id, account_id, user_id).await?;
        let calc = self.balances();
        calc.add_balance(&mut account, as_of).await?;
        calc.add_native_balance_cost(&mut account, as_of).await?;
        Ok(account)
    }

    /// Creates an account under a parent the caller can write to.
    pub async fn create_account(
        &self,
        mut account: Account,
        user_id: UserId,
    ) -> Result<Account, LedgerError> {
        check_required(&account)?;
        let parent = account.parent.ok_or(LedgerError::MissingField("parent"))?;

        self.require_member(account.org_id, user_id).await?;
        let accessible = self.accessible_accounts(account.org_id, user_id).await?;
        if !has_write_access(&accessible, parent) {
            return Err(LedgerError::AccountAccessDenied(parent));
        }

        let now = Utc::now();
        account.inserted = now;
        account.updated = now;
        account.balance = None;
        account.native_balance = None;
        account.has_children = false;
        account.read_only = false;
        self.store.insert_account(&account).await?;

        info!(
            account_id = %account.id,
            org_id = %account.org_id,
            name = %account.name,
            "Account created"
        );
        self.notify(account.org_id, Action::Create, Payload::Account(account.clone()))
            .await;
        Ok(account)
    }

    /// Updates name, parent, currency, precision and debit flag.
    ///
    /// Returns the account with its balance and cost-basis native balance
    /// as of now.
    pub async fn update_account(
        &self,
        mut account: Account,
        user_id: UserId,
    ) -> Result<Account, LedgerError> {
        check_required(&account)?;
        let parent = account.parent.ok_or(LedgerError::MissingField("parent"))?;
        if parent == account.id {
            return Err(LedgerError::SelfParent);
        }

        self.require_member(account.org_id, user_id).await?;
        let tree = self.account_tree(account.org_id).await?;
        let Some(existing) = tree.get(account.id) else {
            return Err(LedgerError::AccountNotFound(account.id));
        };
        let inserted = existing.inserted;
        let has_children = existing.has_children;
        if tree.is_descendant_of(parent, account.id) {
            return Err(LedgerError::DescendantParent);
        }

        let accessible = self.resolve_tree(tree, account.org_id, user_id).await?;
        if !has_write_access(&accessible, parent) {
            return Err(LedgerError::AccountAccessDenied(parent));
        }

        account.inserted = inserted;
        account.updated = Utc::now();
        account.has_children = has_children;
        account.read_only = false;
        self.store.update_account(&account).await?;

        let now = Utc::now();
        let calc = self.balances();
        calc.add_balance(&mut account, now).await?;
        calc.add_native_balance_cost(&mut account, now).await?;

        info!(account_id = %account.id, org_id = %account.org_id, "Account updated");
        self.notify(account.org_id, Action::Update, Payload::Account(account.clone()))
            .await;
        Ok(account)
    }

    /// Hard-deletes a leaf account that has never been posted to.
    pub async fn delete_account(
        &self,
        org_id: OrganizationId,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<(), LedgerError> {
        self.require_member(org_id, user_id).await?;
        let accessible = self.accessible_accounts(org_id, user_id).await?;
        if !has_write_access(&accessible, account_id) {
            return Err(LedgerError::AccountAccessDenied(account_id));
        }

        if self.store.split_count(account_id).await? != 0 {
            return Err(LedgerError::AccountHasTransactions);
        }
        if self.store.child_count(account_id).await? != 0 {
            return Err(LedgerError::AccountHasChildren);
        }

        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        self.store.delete_account(account_id).await?;

        info!(account_id = %account_id, org_id = %org_id, "Account deleted");
        self.notify(org_id, Action::Delete, Payload::Account(account)).await;
        Ok(())
    }
}
