//! Shared fixtures for service tests.

use std::sync::Arc;

use chrono::Utc;
use tally_shared::types::{AccountId, UserId};
use tokio::sync::mpsc;

use crate::ledger::LedgerService;
use crate::ledger::types::{Account, Split, Transaction};
use crate::notify::{ChannelNotifier, Notification};
use crate::org::Org;
use crate::store::MemoryDatastore;

/// A service over a fresh in-memory store with one "Acme" USD/2 org.
pub(crate) struct Harness {
    pub service: LedgerService,
    pub store: Arc<MemoryDatastore>,
    pub rx: mpsc::Receiver<Notification>,
    pub user: UserId,
    pub org: Org,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryDatastore::new());
        let (notifier, rx) = ChannelNotifier::new(64);
        let service = LedgerService::new(store.clone(), Arc::new(notifier));
        let user = UserId::new();
        let org = service
            .create_org(Org::new("Acme", "USD", 2), user)
            .await
            .unwrap();
        Self {
            service,
            store,
            rx,
            user,
            org,
        }
    }

    /// Looks up an account of the org by name.
    pub async fn named(&self, name: &str) -> Account {
        self.service
            .get_accounts(self.org.id, self.user)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.name == name)
            .unwrap()
    }

    /// Creates an account under `parent` in the given currency.
    pub async fn add_account(&self, name: &str, parent: AccountId, currency: &str) -> Account {
        let account = Account::new(self.org.id, name, Some(parent), currency, 2, true);
        self.service.create_account(account, self.user).await.unwrap()
    }

    /// A balanced transaction dated `days_ago` days in the past.
    pub fn transaction(&self, days_ago: i64, splits: &[(AccountId, i64)]) -> Transaction {
        let splits = splits
            .iter()
            .map(|&(account, amount)| Split::new(account, amount, amount))
            .collect();
        let mut tx = Transaction::new(self.org.id, "test", splits);
        tx.date = Utc::now() - chrono::Duration::days(days_ago);
        tx
    }

    /// Everything published so far.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.rx.try_recv() {
            out.push(n);
        }
        out
    }
}
