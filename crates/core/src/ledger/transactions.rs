//! Transaction lifecycle: create, replace, delete and listing.

use chrono::Utc;
use tally_shared::types::{AccountId, OrganizationId, TransactionId, UserId};
use tracing::info;

use super::error::LedgerError;
use super::hierarchy::has_write_access;
use super::query::QueryOptions;
use super::service::LedgerService;
use super::types::{Account, Transaction, TransactionTransition, is_unset};
use super::validation::{check_split_count, validate_splits};
use crate::notify::{Action, Payload};

fn check_ids(transaction: &Transaction) -> Result<(), LedgerError> {
    if transaction.id.is_nil() {
        return Err(LedgerError::MissingField("id"));
    }
    if transaction.org_id.is_nil() {
        return Err(LedgerError::MissingField("orgId"));
    }
    Ok(())
}

fn require_write_on_splits(
    accessible: &[Account],
    transaction: &Transaction,
) -> Result<(), LedgerError> {
    match transaction
        .account_ids()
        .find(|&id| !has_write_access(accessible, id))
    {
        Some(id) => Err(LedgerError::AccountAccessDenied(id)),
        None => Ok(()),
    }
}

impl LedgerService {
    /// Validates the caller's splits and returns their accessible accounts.
    async fn check_splits(
        &self,
        transaction: &Transaction,
        user_id: UserId,
    ) -> Result<Vec<Account>, LedgerError> {
        check_split_count(&transaction.splits)?;
        let org = self.require_member(transaction.org_id, user_id).await?;
        let accessible = self.accessible_accounts(org.id, user_id).await?;
        validate_splits(&transaction.splits, &org.currency, &accessible)?;
        Ok(accessible)
    }

    /// Loads a live transaction of `org_id`.
    async fn load_active(
        &self,
        org_id: OrganizationId,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.store
            .get_transaction(id)
            .await?
            .filter(|tx| tx.org_id == org_id && !tx.deleted)
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Persists a transition, then announces it.
    async fn apply(&self, transition: &TransactionTransition) -> Result<(), LedgerError> {
        let (org_id, events) = match transition {
            TransactionTransition::Created(tx) => {
                self.store.insert_transaction(tx).await?;
                (tx.org_id, vec![(Action::Create, tx)])
            }
            TransactionTransition::Replaced {
                original,
                replacement,
            } => {
                self.store
                    .replace_transaction(original.id, replacement)
                    .await?;
                (
                    replacement.org_id,
                    vec![(Action::Delete, original), (Action::Create, replacement)],
                )
            }
            TransactionTransition::Deleted(tx) => {
                self.store.delete_transaction(tx.id, tx.updated).await?;
                (tx.org_id, vec![(Action::Delete, tx)])
            }
        };

        for (action, tx) in events {
            self.notify(org_id, action, Payload::Transaction(tx.clone()))
                .await;
        }
        Ok(())
    }

    /// Records a new balanced transaction on behalf of `user_id`.
    ///
    /// `inserted`/`updated` are set to now; an unset `date` defaults to
    /// `inserted`.
    pub async fn create_transaction(
        &self,
        mut transaction: Transaction,
        user_id: UserId,
    ) -> Result<Transaction, LedgerError> {
        check_ids(&transaction)?;
        self.check_splits(&transaction, user_id).await?;

        let now = Utc::now();
        transaction.user_id = user_id;
        transaction.inserted = now;
        transaction.updated = now;
        if is_unset(transaction.date) {
            transaction.date = now;
        }
        transaction.deleted = false;
        transaction.attach_splits();

        self.apply(&TransactionTransition::Created(transaction.clone()))
            .await?;

        info!(
            transaction_id = %transaction.id,
            org_id = %transaction.org_id,
            splits = transaction.splits.len(),
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Supersedes transaction `old_id` with `transaction`.
    ///
    /// The old transaction and its splits are soft-deleted and the new one is
    /// inserted in one atomic step, so both carry the same `updated` stamp.
    /// The replacement keeps the original's `inserted` and, when its own date
    /// is unset, the original's date. It must carry a new id. Write access is
    /// checked against the replacement's splits only.
    pub async fn update_transaction(
        &self,
        old_id: TransactionId,
        mut transaction: Transaction,
        user_id: UserId,
    ) -> Result<Transaction, LedgerError> {
        if old_id.is_nil() {
            return Err(LedgerError::MissingField("id"));
        }
        check_ids(&transaction)?;
        if transaction.id == old_id {
            return Err(LedgerError::ReusedTransactionId);
        }
        self.check_splits(&transaction, user_id).await?;

        let original = self.load_active(transaction.org_id, old_id).await?;

        let now = Utc::now();
        transaction.user_id = user_id;
        transaction.inserted = original.inserted;
        transaction.updated = now;
        if is_unset(transaction.date) {
            transaction.date = original.date;
        }
        transaction.deleted = false;
        transaction.attach_splits();

        let mut superseded = original;
        superseded.deleted = true;
        superseded.updated = now;

        self.apply(&TransactionTransition::Replaced {
            original: superseded,
            replacement: transaction.clone(),
        })
        .await?;

        info!(
            old_id = %old_id,
            transaction_id = %transaction.id,
            org_id = %transaction.org_id,
            "Transaction replaced"
        );
        Ok(transaction)
    }

    /// Soft-deletes a transaction. The caller needs write access to every
    /// account it touches.
    pub async fn delete_transaction(
        &self,
        org_id: OrganizationId,
        id: TransactionId,
        user_id: UserId,
    ) -> Result<(), LedgerError> {
        self.require_member(org_id, user_id).await?;
        let mut transaction = self.load_active(org_id, id).await?;
        let accessible = self.accessible_accounts(org_id, user_id).await?;
        require_write_on_splits(&accessible, &transaction)?;

        transaction.deleted = true;
        transaction.updated = Utc::now();
        self.apply(&TransactionTransition::Deleted(transaction)).await?;

        info!(transaction_id = %id, org_id = %org_id, "Transaction deleted");
        Ok(())
    }

    /// Transactions touching one account the caller can write to.
    pub async fn get_transactions_by_account(
        &self,
        org_id: OrganizationId,
        account_id: AccountId,
        user_id: UserId,
        options: &QueryOptions,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.require_member(org_id, user_id).await?;
        let accessible = self.accessible_accounts(org_id, user_id).await?;
        if !has_write_access(&accessible, account_id) {
            return Err(LedgerError::AccountAccessDenied(account_id));
        }
        Ok(self
            .store
            .transactions_by_account(account_id, options)
            .await?)
    }

    /// Transactions of the org touching any account the caller can see.
    pub async fn get_transactions_by_org(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
        options: &QueryOptions,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.require_member(org_id, user_id).await?;
        let ids: Vec<AccountId> = self
            .accessible_accounts(org_id, user_id)
            .await?
            .iter()
            .map(|a| a.id)
            .collect();
        Ok(self.store.transactions_by_org(org_id, options, &ids).await?)
    }
}
