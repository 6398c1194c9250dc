//! The ledger service: entry point for every ledger operation.
//!
//! `LedgerService` owns its collaborators explicitly: a [`Datastore`] for
//! persistence and a [`NotificationSink`] for change events. Operations are
//! split across modules by entity (`accounts`, `transactions`, and the
//! `org`, `price` and `budget` modules) as separate `impl` blocks.

use std::sync::Arc;

use tally_shared::types::{OrganizationId, UserId};
use tracing::{debug, warn};

use super::balance::BalanceCalculator;
use super::error::LedgerError;
use super::hierarchy::AccountTree;
use super::types::Account;
use crate::notify::{Action, Notification, NotificationSink, Payload};
use crate::org::Org;
use crate::store::Datastore;

/// Validates, persists and announces ledger changes.
#[derive(Clone)]
pub struct LedgerService {
    pub(crate) store: Arc<dyn Datastore>,
    notifier: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService").finish_non_exhaustive()
    }
}

impl LedgerService {
    /// Creates a service over the given datastore and notification sink.
    pub fn new(store: Arc<dyn Datastore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    /// The underlying datastore.
    pub fn store(&self) -> &dyn Datastore {
        self.store.as_ref()
    }

    /// Balance calculator over this service's datastore.
    pub fn balances(&self) -> BalanceCalculator<'_> {
        BalanceCalculator::new(self.store.as_ref())
    }

    /// Loads the org if `user_id` is a member of it.
    pub(crate) async fn require_member(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Org, LedgerError> {
        self.store
            .get_org(org_id, user_id)
            .await?
            .ok_or(LedgerError::NotOrgMember)
    }

    /// Builds the full account tree of an org.
    pub(crate) async fn account_tree(&self, org_id: OrganizationId) -> Result<AccountTree, LedgerError> {
        let accounts = self.store.accounts_by_org(org_id).await?;
        Ok(AccountTree::build(accounts))
    }

    /// Resolves the accounts `user_id` can see in `tree`.
    pub(crate) async fn resolve_tree(
        &self,
        tree: AccountTree,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Account>, LedgerError> {
        let permissioned = self.store.permissioned_account_ids(org_id, user_id).await?;
        Ok(tree.resolve(&permissioned))
    }

    /// Accounts `user_id` can see in `org_id`, annotated with `read_only`.
    pub(crate) async fn accessible_accounts(
        &self,
        org_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Account>, LedgerError> {
        let tree = self.account_tree(org_id).await?;
        self.resolve_tree(tree, org_id, user_id).await
    }

    /// Publishes a change to every member of the org.
    ///
    /// Failures are logged and swallowed; the write has already happened.
    pub(crate) async fn notify(&self, org_id: OrganizationId, action: Action, payload: Payload) {
        let recipients = match self.store.org_user_ids(org_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, org_id = %org_id, "Failed to load notification recipients");
                return;
            }
        };

        let notification = Notification::new(action, payload, recipients);
        let kind = notification.kind;
        match self.notifier.push(notification) {
            Ok(()) => debug!(org_id = %org_id, ?kind, ?action, "Notification queued"),
            Err(e) => warn!(error = %e, org_id = %org_id, ?kind, ?action, "Failed to queue notification"),
        }
    }
}
