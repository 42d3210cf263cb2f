//! Broadcast channel for ledger changes.
//!
//! [`ChangeFeed`] wraps a [`tokio::sync::broadcast`] channel. Every committed
//! write publishes a [`LedgerChange`], and every snapshot subscription
//! listens for changes on its own path.

use tokio::sync::broadcast;

/// Default ring buffer size for the change feed.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// How a record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Appended,
    Created,
    Overwritten,
    Updated,
}

/// One committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerChange {
    pub path: String,
    pub key: String,
    pub kind: ChangeKind,
}

impl LedgerChange {
    pub fn new(path: impl Into<String>, key: impl Into<String>, kind: ChangeKind) -> Self {
        LedgerChange {
            path: path.into(),
            key: key.into(),
            kind,
        }
    }
}

/// Broadcast feed of [`LedgerChange`]s.
///
/// When the ring buffer is full the oldest changes are dropped for lagging
/// receivers; a subscription that lags simply re-reads its collection.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<LedgerChange>,
}

impl ChangeFeed {
    /// Creates a new `ChangeFeed` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a change to all subscribers.
    ///
    /// Returns the number of receivers. With no receivers the change is dropped.
    pub fn publish(&self, change: LedgerChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    /// Creates a receiver for all future changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerChange> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_receivers_returns_zero() {
        let feed = ChangeFeed::new(16);
        let count = feed.publish(LedgerChange::new("cashCounts", "k1", ChangeKind::Appended));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_change() {
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();

        feed.publish(LedgerChange::new("tillShifts", "shift-1", ChangeKind::Created));

        let Ok(change) = rx.recv().await else {
            panic!("expected to receive change");
        };
        assert_eq!(change.path, "tillShifts");
        assert_eq!(change.key, "shift-1");
        assert_eq!(change.kind, ChangeKind::Created);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.receiver_count(), 0);

        let rx1 = feed.subscribe();
        let _rx2 = feed.subscribe();
        assert_eq!(feed.receiver_count(), 2);

        drop(rx1);
        assert_eq!(feed.receiver_count(), 1);
    }
}
