//! Budget data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, OrganizationId};

/// A planned amount for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetItem {
    /// Budgeted account.
    pub account_id: AccountId,
    /// Planned amount in the account's minor units.
    pub amount: i64,
}

/// The single active budget of an org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Owning org.
    pub org_id: OrganizationId,
    /// When the budget was last replaced.
    #[serde(default)]
    pub inserted: DateTime<Utc>,
    /// Line items, in the order they were supplied.
    pub items: Vec<BudgetItem>,
}

impl Budget {
    /// Creates a budget for `org_id` from items.
    pub fn new(org_id: OrganizationId, items: Vec<BudgetItem>) -> Self {
        Self {
            org_id,
            inserted: DateTime::<Utc>::default(),
            items,
        }
    }
}
