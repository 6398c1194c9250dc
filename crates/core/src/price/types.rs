//! Price type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{OrganizationId, PriceId};

use crate::ledger::LedgerError;

/// Units of org currency per unit of `currency`, valid at `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Price id.
    pub id: PriceId,
    /// Owning org.
    pub org_id: OrganizationId,
    /// Foreign currency code.
    pub currency: String,
    /// Effective date. Epoch zero means "use the insertion time".
    #[serde(default)]
    pub date: DateTime<Utc>,
    /// Creation time.
    #[serde(default)]
    pub inserted: DateTime<Utc>,
    /// Last modification time.
    #[serde(default)]
    pub updated: DateTime<Utc>,
    /// Exchange rate.
    pub price: f64,
}

impl Price {
    /// Creates a price with unset dates.
    pub fn new(org_id: OrganizationId, currency: impl Into<String>, price: f64) -> Self {
        Self {
            id: PriceId::new(),
            org_id,
            currency: currency.into(),
            date: DateTime::<Utc>::default(),
            inserted: DateTime::<Utc>::default(),
            updated: DateTime::<Utc>::default(),
            price,
        }
    }

    /// Rejects NaN, infinite, zero and negative rates.
    pub fn validate_rate(&self) -> Result<(), LedgerError> {
        if self.price.is_finite() && self.price > 0.0 {
            Ok(())
        } else {
            Err(LedgerError::InvalidPrice)
        }
    }
}
