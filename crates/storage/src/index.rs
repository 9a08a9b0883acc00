//! Fire-and-forget notifications towards the search index.

use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::PublicationStatus;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum IndexEvent {
    Published(StorageId),
    StatusChanged {
        id: StorageId,
        status: PublicationStatus,
    },
    Deleted(StorageId),
    Undeleted(StorageId),
    ContentChanged(StorageId),
    Purged(StorageId),
}

pub trait IndexNotifier: Send + Sync {
    /// Must not block and must not fail the caller.
    fn notify(&self, event: IndexEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopIndex;

impl IndexNotifier for NoopIndex {
    fn notify(&self, event: IndexEvent) {
        trace!(?event, "Index notification dropped");
    }
}

/// Publishes events on a broadcast channel for an index worker to consume.
#[derive(Clone, Debug)]
pub struct BroadcastIndex {
    sender: broadcast::Sender<IndexEvent>,
}

impl BroadcastIndex {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);

        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }
}

impl IndexNotifier for BroadcastIndex {
    fn notify(&self, event: IndexEvent) {
        // no subscribers
        let _ignored = self.sender.send(event);
    }
}
