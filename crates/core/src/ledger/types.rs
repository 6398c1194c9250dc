//! Domain types for the chart of accounts and posted transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, OrganizationId, TransactionId, UserId};

/// Returns true when a timestamp carries the "unset" value (epoch zero).
///
/// Callers leave dates at `DateTime::<Utc>::default()` to ask the service to
/// fill them in.
pub fn is_unset(timestamp: DateTime<Utc>) -> bool {
    timestamp.timestamp_millis() == 0
}

/// A node in an organization's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Owning organization.
    pub org_id: OrganizationId,
    /// Creation time.
    pub inserted: DateTime<Utc>,
    /// Last modification time.
    pub updated: DateTime<Utc>,
    /// Display name.
    pub name: String,
    /// Parent account, `None` only for the root.
    pub parent: Option<AccountId>,
    /// ISO currency code of the amounts posted to this account.
    pub currency: String,
    /// Number of decimal places of the currency's minor unit.
    pub precision: u32,
    /// True when a positive amount increases the balance.
    pub debit_balance: bool,
    /// Sum of split amounts as of a date, in account currency.
    #[serde(default)]
    pub balance: Option<i64>,
    /// Balance expressed in the organization's currency.
    #[serde(default)]
    pub native_balance: Option<i64>,
    /// Computed: the account has at least one child.
    #[serde(default)]
    pub has_children: bool,
    /// Computed: the caller can see but not modify the account.
    #[serde(default)]
    pub read_only: bool,
}

impl Account {
    /// Creates an account with a fresh id and the computed fields cleared.
    pub fn new(
        org_id: OrganizationId,
        name: impl Into<String>,
        parent: Option<AccountId>,
        currency: impl Into<String>,
        precision: u32,
        debit_balance: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            org_id,
            inserted: now,
            updated: now,
            name: name.into(),
            parent,
            currency: currency.into(),
            precision,
            debit_balance,
            balance: None,
            native_balance: None,
            has_children: false,
            read_only: false,
        }
    }
}

/// One leg of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    /// Owning transaction, overwritten with the transaction id on write.
    #[serde(default)]
    pub transaction_id: TransactionId,
    /// Account the amount is posted to.
    pub account_id: AccountId,
    /// Amount in the account's currency minor units.
    pub amount: i64,
    /// Amount in the organization's currency minor units.
    pub native_amount: i64,
}

impl Split {
    /// Creates a split not yet attached to a transaction.
    pub fn new(account_id: AccountId, amount: i64, native_amount: i64) -> Self {
        Self {
            transaction_id: TransactionId::default(),
            account_id,
            amount,
            native_amount,
        }
    }
}

/// A balanced financial event made of two or more splits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id, chosen by the client.
    pub id: TransactionId,
    /// Owning organization.
    pub org_id: OrganizationId,
    /// Creator.
    #[serde(default)]
    pub user_id: UserId,
    /// Value date. Epoch zero means "use the insertion time".
    #[serde(default)]
    pub date: DateTime<Utc>,
    /// Creation time.
    #[serde(default)]
    pub inserted: DateTime<Utc>,
    /// Last modification time.
    #[serde(default)]
    pub updated: DateTime<Utc>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Opaque client data.
    #[serde(default)]
    pub data: String,
    /// Soft-delete marker.
    #[serde(default)]
    pub deleted: bool,
    /// Legs, in persistence order.
    pub splits: Vec<Split>,
}

impl Transaction {
    /// Creates a transaction with unset dates.
    pub fn new(org_id: OrganizationId, description: impl Into<String>, splits: Vec<Split>) -> Self {
        Self {
            id: TransactionId::new(),
            org_id,
            user_id: UserId::default(),
            date: DateTime::<Utc>::default(),
            inserted: DateTime::<Utc>::default(),
            updated: DateTime::<Utc>::default(),
            description: description.into(),
            data: String::new(),
            deleted: false,
            splits,
        }
    }

    /// Ids of the accounts referenced by the splits, in split order.
    pub fn account_ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.splits.iter().map(|split| split.account_id)
    }

    /// Points every split at this transaction's id.
    pub(crate) fn attach_splits(&mut self) {
        for split in &mut self.splits {
            split.transaction_id = self.id;
        }
    }
}

/// A lifecycle step of a transaction: `absent -> active -> (replaced | deleted)`.
///
/// Services build a transition once validation has passed; applying it drives
/// both the datastore write and the notifications that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionTransition {
    /// A new transaction becomes active.
    Created(Transaction),
    /// An active transaction is soft-deleted and superseded by a new one.
    Replaced {
        /// The transaction being superseded, as stored before the change.
        original: Transaction,
        /// The new active transaction.
        replacement: Transaction,
    },
    /// An active transaction is soft-deleted.
    Deleted(Transaction),
}

impl TransactionTransition {
    /// The transaction that is active once the transition is applied, if any.
    pub fn active(&self) -> Option<&Transaction> {
        match self {
            Self::Created(tx) | Self::Replaced { replacement: tx, .. } => Some(tx),
            Self::Deleted(_) => None,
        }
    }
}
