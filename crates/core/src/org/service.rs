//! Org and invite operations.

use std::str::FromStr;

use chrono::Utc;
use chrono_tz::Tz;
use tally_shared::types::{OrganizationId, UserId};
use tracing::{info, warn};

use super::types::{Invite, Org, new_invite_id};
use crate::ledger::{LedgerError, LedgerService};

fn check_timezone(timezone: &str) -> Result<(), LedgerError> {
    if timezone.is_empty() || Tz::from_str(timezone).is_ok() {
        Ok(())
    } else {
        Err(LedgerError::InvalidTimezone(timezone.to_string()))
    }
}

impl LedgerService {
    /// Creates an org with the standard chart of accounts.
    ///
    /// The creator becomes an admin member with write access on Root.
    pub async fn create_org(&self, mut org: Org, user_id: UserId) -> Result<Org, LedgerError> {
        if org.id.is_nil() {
            return Err(LedgerError::MissingField("id"));
        }
        if org.name.is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        if org.currency.is_empty() {
            return Err(LedgerError::MissingField("currency"));
        }
        check_timezone(&org.timezone)?;

        let now = Utc::now();
        org.inserted = now;
        org.updated = now;
        let accounts = org.standard_accounts(now);
        self.store.create_org(&org, user_id, &accounts).await?;

        info!(org_id = %org.id, name = %org.name, currency = %org.currency, "Org created");
        Ok(org)
    }

    /// Renames an org or changes its timezone.
    pub async fn update_org(&self, mut org: Org, user_id: UserId) -> Result<Org, LedgerError> {
        let Some(existing) = self.store.get_org(org.id, user_id).await? else {
            return Err(LedgerError::AccessDenied);
        };
        if org.name.is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        check_timezone(&org.timezone)?;

        org.inserted = existing.inserted;
        org.updated = Utc::now();
        org.currency = existing.currency;
        org.precision = existing.precision;
        self.store.update_org(&org).await?;

        info!(org_id = %org.id, "Org updated");
        Ok(org)
    }

    /// Loads an org the caller belongs to.
    pub async fn get_org(&self, org_id: OrganizationId, user_id: UserId) -> Result<Org, LedgerError> {
        self.store
            .get_org(org_id, user_id)
            .await?
            .ok_or(LedgerError::OrgNotFound)
    }

    /// Every org the caller belongs to.
    pub async fn get_orgs(&self, user_id: UserId) -> Result<Vec<Org>, LedgerError> {
        Ok(self.store.get_orgs(user_id).await?)
    }

    /// True when the caller is a member of the org.
    pub async fn user_belongs_to_org(
        &self,
        user_id: UserId,
        org_id: OrganizationId,
    ) -> Result<bool, LedgerError> {
        Ok(self.store.get_org(org_id, user_id).await?.is_some())
    }

    async fn is_admin(&self, org_id: OrganizationId, user_id: UserId) -> Result<bool, LedgerError> {
        Ok(self.store.org_admin_ids(org_id).await?.contains(&user_id))
    }

    /// Issues an invite. Admin only.
    pub async fn create_invite(&self, mut invite: Invite, user_id: UserId) -> Result<Invite, LedgerError> {
        if !self.is_admin(invite.org_id, user_id).await? {
            return Err(LedgerError::AdminRequiredToInvite);
        }

        let now = Utc::now();
        invite.id = new_invite_id();
        invite.inserted = now;
        invite.updated = now;
        invite.accepted = false;
        self.store.insert_invite(&invite).await?;

        // No mail transport is wired in; the invite id is handed out of band.
        info!(org_id = %invite.org_id, invite_id = %invite.id, "Invite created");
        Ok(invite)
    }

    /// Joins the invite's org as a non-admin member with write access on Root.
    ///
    /// `invite.accepted` must be true. Invites are valid for seven days after
    /// issue, inclusive.
    pub async fn accept_invite(&self, invite: Invite, user_id: UserId) -> Result<Invite, LedgerError> {
        if !invite.accepted {
            return Err(LedgerError::InviteNotAccepted);
        }
        if invite.id.is_empty() {
            return Err(LedgerError::MissingInviteId);
        }

        let Some(mut original) = self.store.get_invite(&invite.id).await? else {
            return Err(LedgerError::InviteNotFound(invite.id));
        };
        if original.accepted {
            return Err(LedgerError::InviteAlreadyAccepted);
        }
        let now = Utc::now();
        if original.is_expired(now) {
            warn!(invite_id = %original.id, org_id = %original.org_id, "Expired invite presented");
            return Err(LedgerError::InviteExpired);
        }

        original.accepted = true;
        original.updated = now;
        self.store.accept_invite(&original, user_id).await?;

        info!(org_id = %original.org_id, invite_id = %original.id, user_id = %user_id, "Invite accepted");
        Ok(original)
    }

    /// Lists an org's invites. Admin only.
    pub async fn get_invites(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Invite>, LedgerError> {
        if !self.is_admin(org_id, user_id).await? {
            return Err(LedgerError::AdminRequiredToInvite);
        }
        Ok(self.store.get_invites(org_id).await?)
    }

    /// Revokes an invite. Admin only.
    pub async fn delete_invite(&self, id: &str, user_id: UserId) -> Result<(), LedgerError> {
        let invite = self
            .store
            .get_invite(id)
            .await?
            .ok_or_else(|| LedgerError::InviteNotFound(id.to_string()))?;
        if !self.is_admin(invite.org_id, user_id).await? {
            return Err(LedgerError::AdminRequiredToDeleteInvite);
        }
        self.store.delete_invite(id).await?;
        info!(org_id = %invite.org_id, invite_id = %id, "Invite deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Datastore;
    use crate::testing::Harness;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_org_seeds_chart() {
        let h = Harness::new().await;
        let accounts = h.service.get_accounts(h.org.id, h.user).await.unwrap();

        let mut names: Vec<_> = accounts.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Assets", "Equity", "Expenses", "Income", "Liabilities", "Root"]);

        let root = accounts.iter().find(|a| a.name == "Root").unwrap();
        assert!(accounts.iter().filter(|a| a.id != root.id).all(|a| a.parent == Some(root.id)));
        assert!(accounts.iter().all(|a| !a.read_only));
        assert!(h.service.user_belongs_to_org(h.user, h.org.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_org_validation() {
        let h = Harness::new().await;
        let err = h.service.create_org(Org::new("", "USD", 2), h.user).await.unwrap_err();
        assert_eq!(err.to_string(), "name required");

        let err = h.service.create_org(Org::new("X", "", 2), h.user).await.unwrap_err();
        assert_eq!(err.to_string(), "currency required");

        let mut zoned = Org::new("X", "USD", 2);
        zoned.timezone = "Mars/Olympus".into();
        let err = h.service.create_org(zoned.clone(), h.user).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTimezone(_)));

        zoned.timezone = "America/New_York".into();
        assert!(h.service.create_org(zoned, h.user).await.is_ok());
        assert_eq!(h.service.get_orgs(h.user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_org() {
        let h = Harness::new().await;
        let mut renamed = h.org.clone();
        renamed.name = "Acme Ltd".into();
        renamed.currency = "EUR".into();

        let err = h.service.update_org(renamed.clone(), UserId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "access denied");

        let updated = h.service.update_org(renamed, h.user).await.unwrap();
        assert_eq!(updated.currency, "USD");
        let loaded = h.service.get_org(h.org.id, h.user).await.unwrap();
        assert_eq!(loaded.name, "Acme Ltd");

        let mut blank = loaded;
        blank.name = String::new();
        let err = h.service.update_org(blank, h.user).await.unwrap_err();
        assert_eq!(err.to_string(), "name required");
    }

    #[tokio::test]
    async fn test_invite_flow() {
        let h = Harness::new().await;
        let invite = h
            .service
            .create_invite(Invite::new(h.org.id, "new@example.com"), h.user)
            .await
            .unwrap();
        assert_eq!(invite.id.len(), 8);
        assert_eq!(h.service.get_invites(h.org.id, h.user).await.unwrap().len(), 1);

        let newcomer = UserId::new();
        let err = h.service.accept_invite(invite.clone(), newcomer).await.unwrap_err();
        assert_eq!(err.to_string(), "accepted must be true");

        let mut acceptance = invite.clone();
        acceptance.accepted = true;
        acceptance.id = String::new();
        let err = h.service.accept_invite(acceptance.clone(), newcomer).await.unwrap_err();
        assert_eq!(err.to_string(), "missing invite id");

        acceptance.id.clone_from(&invite.id);
        h.service.accept_invite(acceptance.clone(), newcomer).await.unwrap();
        assert!(h.service.user_belongs_to_org(newcomer, h.org.id).await.unwrap());

        // non-admin member, but write access through Root
        let err = h
            .service
            .create_invite(Invite::new(h.org.id, "x@example.com"), newcomer)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Must be org admin to invite users");
        let accounts = h.service.get_accounts(h.org.id, newcomer).await.unwrap();
        assert!(accounts.iter().all(|a| !a.read_only));

        let err = h.service.accept_invite(acceptance, UserId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "invite already accepted");
    }

    async fn backdated_invite(h: &Harness, age: Duration) -> Invite {
        let now = Utc::now();
        let invite = Invite {
            id: new_invite_id(),
            org_id: h.org.id,
            inserted: now - age,
            updated: now - age,
            email: "late@example.com".into(),
            accepted: false,
        };
        h.store.insert_invite(&invite).await.unwrap();
        Invite {
            accepted: true,
            ..invite
        }
    }

    #[tokio::test]
    async fn test_invite_expired_after_eight_days() {
        let h = Harness::new().await;
        let invite = backdated_invite(&h, Duration::days(8)).await;
        let err = h.service.accept_invite(invite, UserId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "invite has expired");
    }

    #[tokio::test]
    async fn test_invite_valid_just_inside_seven_days() {
        let h = Harness::new().await;
        // a minute of slack so the check does not race the clock
        let invite = backdated_invite(&h, Duration::days(7) - Duration::minutes(1)).await;
        assert!(h.service.accept_invite(invite, UserId::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_invite_admin_only() {
        let h = Harness::new().await;
        let invite = h
            .service
            .create_invite(Invite::new(h.org.id, "gone@example.com"), h.user)
            .await
            .unwrap();

        let err = h.service.delete_invite(&invite.id, UserId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Must be org admin to delete invite");

        h.service.delete_invite(&invite.id, h.user).await.unwrap();
        assert!(h.service.get_invites(h.org.id, h.user).await.unwrap().is_empty());
        let err = h.service.delete_invite(&invite.id, h.user).await.unwrap_err();
        assert!(matches!(err, LedgerError::InviteNotFound(_)));
    }
}
