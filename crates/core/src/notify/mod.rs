//! Outbound "entity changed" notifications.
//!
//! Services publish one [`Notification`] per successful write. Delivery is
//! best-effort: a sink error is logged by the caller and never fails the
//! operation that produced it.

use serde::Serialize;
use tally_shared::types::UserId;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ledger::types::{Account, Transaction};
use crate::price::Price;

/// Errors returned by a [`NotificationSink`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The outbound buffer is at capacity.
    #[error("notification channel is full")]
    Full,

    /// Nobody is listening anymore.
    #[error("notification channel is closed")]
    Closed,
}

/// Kind of entity a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// An account.
    Account,
    /// A transaction.
    Transaction,
    /// A price.
    Price,
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The entity was created.
    Create,
    /// The entity was modified.
    Update,
    /// The entity was removed.
    Delete,
}

/// The changed entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Account snapshot.
    Account(Account),
    /// Transaction snapshot.
    Transaction(Transaction),
    /// Price snapshot.
    Price(Price),
}

impl Payload {
    /// The kind of entity carried.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Account(_) => EntityKind::Account,
            Self::Transaction(_) => EntityKind::Transaction,
            Self::Price(_) => EntityKind::Price,
        }
    }
}

/// An "entity changed" event addressed to a set of users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Kind of entity.
    pub kind: EntityKind,
    /// What happened.
    pub action: Action,
    /// Snapshot of the entity after (or, for deletes, before) the change.
    pub payload: Payload,
    /// Users to notify.
    pub recipients: Vec<UserId>,
}

impl Notification {
    /// Builds a notification, deriving `kind` from the payload.
    pub fn new(action: Action, payload: Payload, recipients: Vec<UserId>) -> Self {
        Self {
            kind: payload.kind(),
            action,
            payload,
            recipients,
        }
    }
}

/// Receiver of entity-changed events.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    /// Hands a notification over for delivery without blocking.
    fn push(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Sink backed by a bounded tokio channel.
///
/// `push` uses `try_send`, so a slow consumer makes the sink report
/// [`NotifyError::Full`] instead of stalling the writer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    /// Creates the sink and the receiving half for the delivery task.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn push(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.try_send(notification).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => NotifyError::Full,
            mpsc::error::TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}

/// Sink that drops everything, for tools that have no subscribers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn push(&self, _notification: Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::Price;
    use tally_shared::types::OrganizationId;

    fn price_notification() -> Notification {
        let price = Price::new(OrganizationId::new(), "EUR", 1.1);
        Notification::new(Action::Create, Payload::Price(price), vec![UserId::new()])
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = ChannelNotifier::new(4);
        sink.push(price_notification()).unwrap();
        let mut second = price_notification();
        second.action = Action::Delete;
        sink.push(second).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EntityKind::Price);
        assert_eq!(first.action, Action::Create);
        assert_eq!(rx.recv().await.unwrap().action, Action::Delete);
    }

    #[test]
    fn test_channel_full_does_not_block() {
        let (sink, _rx) = ChannelNotifier::new(1);
        sink.push(price_notification()).unwrap();
        assert!(matches!(sink.push(price_notification()), Err(NotifyError::Full)));
    }

    #[test]
    fn test_channel_closed() {
        let (sink, rx) = ChannelNotifier::new(1);
        drop(rx);
        assert!(matches!(sink.push(price_notification()), Err(NotifyError::Closed)));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(price_notification()).unwrap();
        assert_eq!(json["kind"], "price");
        assert_eq!(json["action"], "create");
        assert_eq!(json["payload"]["currency"], "EUR");
    }
}
