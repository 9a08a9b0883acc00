use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use metashare_folderstore::archive::ResourceArchive;
use metashare_primitives::digest::compute_digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::CopyStatus;
use metashare_storage::envelope::GlobalEnvelope;
use metashare_storage::error::StorageError;
use metashare_storage::{RemoteUpdate, StorageManager, UpdateOutcome};
use parking_lot::Mutex;
use tokio::sync::Mutex as PassLock;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::{NodeDescriptor, SyncConfig};
use crate::error::SyncError;
use crate::peer::{Peer, PeerConnector};
use crate::protocol::InventoryEntry;

/// Outcome of one pull pass against one node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PullReport {
    pub node: String,
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
    pub failed: usize,
    /// Local copies from this node that it no longer offers.
    pub stale: Vec<StorageId>,
}

impl PullReport {
    fn new(node: &str) -> Self {
        Self {
            node: node.to_owned(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Pulled {
    Unchanged,
    Applied(UpdateOutcome),
}

/// Mirrors the inventories of configured nodes into local storage.
#[derive(Clone)]
pub struct Puller {
    storage: StorageManager,
    config: Arc<SyncConfig>,
    connector: Arc<dyn PeerConnector>,
    passes: Arc<Mutex<HashMap<String, Arc<PassLock<()>>>>>,
}

impl core::fmt::Debug for Puller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Puller")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Puller {
    #[must_use]
    pub fn new(
        storage: StorageManager,
        config: Arc<SyncConfig>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            storage,
            config,
            connector,
            passes: Arc::default(),
        }
    }

    fn pass_lock(&self, node: &str) -> Arc<PassLock<()>> {
        Arc::clone(self.passes.lock().entry(node.to_owned()).or_default())
    }

    /// Pulls from every configured core and proxied node in turn.
    pub async fn pull_all(&self) -> Vec<(String, Result<PullReport, SyncError>)> {
        let nodes = self
            .config
            .core_nodes
            .iter()
            .map(|(name, node)| (name, node, CopyStatus::Remote))
            .chain(
                self.config
                    .proxied_nodes
                    .iter()
                    .map(|(name, node)| (name, node, CopyStatus::Proxy)),
            );

        let mut results = Vec::new();

        for (name, node, copy_status) in nodes {
            let result = match self.connector.connect(name, node) {
                Ok(peer) => self.pull_node(name, node, copy_status, &*peer).await,
                Err(err) => Err(err),
            };

            match &result {
                Ok(report) => info!(
                    node = %name,
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    failed = report.failed,
                    stale = report.stale.len(),
                    "Pull pass finished"
                ),
                Err(err) if err.is_retryable() => {
                    warn!(node = %name, %err, "Pull pass failed, will retry next pass");
                }
                Err(err) => error!(node = %name, %err, "Pull pass failed"),
            }

            results.push((name.clone(), result));
        }

        results
    }

    /// One pass against one node. Never overlaps another pass against the
    /// same node; a concurrent attempt fails with [`SyncError::Busy`].
    pub async fn pull_node(
        &self,
        name: &str,
        node: &NodeDescriptor,
        copy_status: CopyStatus,
        peer: &dyn Peer,
    ) -> Result<PullReport, SyncError> {
        let lock = self.pass_lock(name);

        let Ok(_pass) = lock.try_lock() else {
            warn!(node = %name, "Pull pass already running, skipping");
            return Err(SyncError::Busy(name.to_owned()));
        };

        debug!(node = %name, url = %node.url, %copy_status, "Starting pull pass");

        let inventory = time::timeout(
            self.config.timeout,
            peer.inventory(&self.config.protocol_versions),
        )
        .await
        .map_err(|_| SyncError::Timeout)??;

        debug!(
            node = %name,
            protocol = %inventory.protocol_version,
            peer_version = ?inventory.node_version,
            entries = inventory.entries.len(),
            "Received inventory"
        );

        let mut report = PullReport::new(name);
        let mut offered = BTreeSet::new();

        for entry in inventory.entries {
            let _inserted = offered.insert(entry.id);

            match self.pull_object(name, copy_status, peer, entry).await {
                Ok(Pulled::Unchanged) => report.unchanged += 1,
                Ok(Pulled::Applied(UpdateOutcome::Created)) => report.created += 1,
                Ok(Pulled::Applied(UpdateOutcome::Updated)) => report.updated += 1,
                Err(err) => {
                    report.failed += 1;

                    if err.is_retryable() {
                        warn!(node = %name, id = %entry.id, %err, "Failed to pull object");
                    } else {
                        error!(node = %name, id = %entry.id, %err, "Failed to pull object");
                    }
                }
            }
        }

        for object in self.storage.list()? {
            if !object.copy_status.is_master()
                && object.source_node.as_deref() == Some(name)
                && !offered.contains(&object.identifier)
            {
                report.stale.push(object.identifier);
            }
        }

        Ok(report)
    }

    async fn pull_object(
        &self,
        name: &str,
        copy_status: CopyStatus,
        peer: &dyn Peer,
        entry: InventoryEntry,
    ) -> Result<Pulled, SyncError> {
        let id = entry.id;

        if let Some(local) = self.storage.get(&id)? {
            if local.digest_checksum == Some(entry.digest) {
                return Ok(Pulled::Unchanged);
            }

            if local.copy_status.is_master() {
                return Err(StorageError::AuthorityConflict(id).into());
            }
        }

        let bytes = time::timeout(self.config.timeout, peer.object(&id))
            .await
            .map_err(|_| SyncError::Timeout)??;

        let archive = ResourceArchive::from_bytes(&bytes).map_err(|err| {
            StorageError::MalformedContent(format!("transfer archive of {id}: {err}"))
        })?;

        let actual =
            compute_digest(&archive.metadata, &archive.global).map_err(|err| {
                StorageError::MalformedContent(format!("transfer archive of {id}: {err}"))
            })?;

        if actual != entry.digest {
            return Err(SyncError::DigestMismatch {
                id,
                expected: entry.digest,
                actual,
            });
        }

        let update = RemoteUpdate {
            envelope: GlobalEnvelope::from_slice(&archive.global)?,
            content: archive.metadata,
            digest: Some(entry.digest),
            copy_status,
            source_node: Some(name.to_owned()),
        };

        let outcome = self.storage.apply_remote_update(&id, update)?;

        Ok(Pulled::Applied(outcome))
    }
}
