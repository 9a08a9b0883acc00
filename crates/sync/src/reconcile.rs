use std::sync::Arc;

use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::CopyStatus;
use metashare_storage::StorageManager;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;

/// Drops proxy copies of nodes that are no longer proxied.
#[derive(Clone, Debug)]
pub struct ProxyReconciler {
    storage: StorageManager,
    config: Arc<SyncConfig>,
}

impl ProxyReconciler {
    #[must_use]
    pub const fn new(storage: StorageManager, config: Arc<SyncConfig>) -> Self {
        Self { storage, config }
    }

    /// Purges every proxy copy whose source node is not configured. Copies of
    /// configured nodes stay, reachable or not.
    pub fn check_proxied_nodes(&self) -> Result<Vec<StorageId>, SyncError> {
        let mut purged = Vec::new();

        for object in self.storage.list()? {
            if object.copy_status != CopyStatus::Proxy {
                continue;
            }

            let configured = object
                .source_node
                .as_ref()
                .is_some_and(|node| self.config.proxied_nodes.contains_key(node));

            if configured {
                continue;
            }

            let id = object.identifier;

            match self.storage.purge(&id) {
                Ok(true) => {
                    info!(%id, node = ?object.source_node, "Purged copy of a node no longer proxied");
                    purged.push(id);
                }
                Ok(false) => {}
                Err(err) => warn!(%id, %err, "Failed to purge stale proxy copy"),
            }
        }

        Ok(purged)
    }
}
