//! Organization and invite types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::OrganizationId;

use crate::ledger::types::Account;

/// How long an invite stays valid after it is issued.
pub const INVITE_TTL_DAYS: i64 = 7;

/// A tenant owning a chart of accounts, transactions, prices and a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    /// Org id.
    pub id: OrganizationId,
    /// Creation time.
    #[serde(default)]
    pub inserted: DateTime<Utc>,
    /// Last modification time.
    #[serde(default)]
    pub updated: DateTime<Utc>,
    /// Display name.
    pub name: String,
    /// Native (reporting) currency code.
    pub currency: String,
    /// Decimal places of the native currency.
    pub precision: u32,
    /// IANA timezone name, empty when unset.
    #[serde(default)]
    pub timezone: String,
}

impl Org {
    /// Creates an org with a fresh id and unset timestamps.
    pub fn new(name: impl Into<String>, currency: impl Into<String>, precision: u32) -> Self {
        Self {
            id: OrganizationId::new(),
            inserted: DateTime::<Utc>::default(),
            updated: DateTime::<Utc>::default(),
            name: name.into(),
            currency: currency.into(),
            precision,
            timezone: String::new(),
        }
    }

    /// The chart of accounts every new org starts with.
    ///
    /// Root first, then Assets, Liabilities, Equity, Income and Expenses,
    /// all in the org's currency and precision.
    pub fn standard_accounts(&self, now: DateTime<Utc>) -> Vec<Account> {
        let mut root = Account::new(self.id, "Root", None, &self.currency, self.precision, true);
        root.inserted = now;
        root.updated = now;
        let root_id = root.id;

        let mut accounts = vec![root];
        for (name, debit_balance) in [
            ("Assets", true),
            ("Liabilities", false),
            ("Equity", false),
            ("Income", false),
            ("Expenses", true),
        ] {
            let mut account = Account::new(
                self.id,
                name,
                Some(root_id),
                &self.currency,
                self.precision,
                debit_balance,
            );
            account.inserted = now;
            account.updated = now;
            accounts.push(account);
        }
        accounts
    }
}

/// An invitation for someone to join an org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    /// Short id, 8 lowercase hex characters.
    #[serde(default)]
    pub id: String,
    /// Org being joined.
    pub org_id: OrganizationId,
    /// Issue time.
    #[serde(default)]
    pub inserted: DateTime<Utc>,
    /// Last modification time.
    #[serde(default)]
    pub updated: DateTime<Utc>,
    /// Address the invite was sent to.
    pub email: String,
    /// Whether someone has accepted the invite.
    #[serde(default)]
    pub accepted: bool,
}

impl Invite {
    /// Creates an unaccepted invite; the service assigns id and timestamps.
    pub fn new(org_id: OrganizationId, email: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            org_id,
            inserted: DateTime::<Utc>::default(),
            updated: DateTime::<Utc>::default(),
            email: email.into(),
            accepted: false,
        }
    }

    /// True once `now` is strictly later than `inserted + 7 days`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.inserted + Duration::days(INVITE_TTL_DAYS)
    }
}

/// Generates an invite id: 4 random bytes as lowercase hex.
pub fn new_invite_id() -> String {
    let bytes: [u8; 4] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_accounts() {
        let org = Org::new("Acme", "USD", 2);
        let accounts = org.standard_accounts(Utc::now());

        let names: Vec<_> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Assets", "Liabilities", "Equity", "Income", "Expenses"]);

        let root = &accounts[0];
        assert!(root.parent.is_none());
        assert!(accounts[1..].iter().all(|a| a.parent == Some(root.id)));
        assert!(accounts.iter().all(|a| a.currency == "USD" && a.precision == 2));

        let debit: Vec<_> = accounts.iter().map(|a| a.debit_balance).collect();
        assert_eq!(debit, vec![true, true, false, false, false, true]);
    }

    #[test]
    fn test_invite_expiry_boundary() {
        let inserted = Utc::now();
        let invite = Invite {
            id: new_invite_id(),
            org_id: OrganizationId::new(),
            inserted,
            updated: inserted,
            email: "a@example.com".into(),
            accepted: false,
        };
        assert!(!invite.is_expired(inserted + Duration::days(7)));
        assert!(invite.is_expired(inserted + Duration::days(7) + Duration::milliseconds(1)));
        assert!(invite.is_expired(inserted + Duration::days(8)));
    }

    #[test]
    fn test_invite_id_format() {
        let id = new_invite_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
