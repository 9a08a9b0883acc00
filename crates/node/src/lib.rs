//! Node bootstrap: opens the stores, serves the sync api and drives the
//! periodic sync jobs.

use std::sync::Arc;

use camino::Utf8PathBuf;
use eyre::{Result as EyreResult, WrapErr};
use metashare_folderstore::config::FolderStoreConfig;
use metashare_folderstore::FolderStore;
use metashare_server::config::ServerConfig;
use metashare_storage::config::LocalNode;
use metashare_storage::index::{BroadcastIndex, IndexEvent, IndexNotifier};
use metashare_storage::StorageManager;
use metashare_store::config::StoreConfig;
use metashare_store::Store;
use metashare_store_rocksdb::RocksDB;
use metashare_sync::config::{DigestConfig, SyncConfig};
use metashare_sync::digest::DigestScheduler;
use metashare_sync::peer::HttpConnector;
use metashare_sync::puller::Puller;
use metashare_sync::reconcile::ProxyReconciler;
use metashare_sync::responder::Responder;
use metashare_sync::scheduler::{Intervals, SyncScheduler};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

const INDEX_CAPACITY: usize = 256;

#[derive(Debug)]
#[non_exhaustive]
pub struct NodeConfig {
    pub home: Utf8PathBuf,
    pub node: LocalNode,
    pub datastore: StoreConfig,
    pub storage: FolderStoreConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub digest: DigestConfig,
}

impl NodeConfig {
    #[must_use]
    pub const fn new(
        home: Utf8PathBuf,
        node: LocalNode,
        datastore: StoreConfig,
        storage: FolderStoreConfig,
        server: ServerConfig,
        sync: SyncConfig,
        digest: DigestConfig,
    ) -> Self {
        Self {
            home,
            node,
            datastore,
            storage,
            server,
            sync,
            digest,
        }
    }
}

/// The services of one node over a shared storage manager.
#[derive(Clone, Debug)]
pub struct Node {
    storage: StorageManager,
    responder: Responder,
    puller: Puller,
    reconciler: ProxyReconciler,
    digests: DigestScheduler,
}

impl Node {
    /// Opens the database and the storage folder root.
    pub fn open(config: &NodeConfig, index: Arc<dyn IndexNotifier>) -> EyreResult<Self> {
        let store = Store::open::<RocksDB>(&config.datastore)
            .wrap_err_with(|| format!("failed to open datastore at {}", config.datastore.path))?;

        let folders = FolderStore::open(&config.storage)?;

        let storage = StorageManager::new(store, folders, config.node.clone()).with_index(index);

        let sync = Arc::new(config.sync.clone());

        Ok(Self {
            responder: Responder::new(storage.clone(), config.sync.protocol_versions.clone()),
            puller: Puller::new(
                storage.clone(),
                Arc::clone(&sync),
                Arc::new(HttpConnector::new(config.sync.timeout)),
            ),
            reconciler: ProxyReconciler::new(storage.clone(), sync),
            digests: DigestScheduler::new(storage.clone(), config.digest),
            storage,
        })
    }

    #[must_use]
    pub const fn storage(&self) -> &StorageManager {
        &self.storage
    }

    #[must_use]
    pub const fn responder(&self) -> &Responder {
        &self.responder
    }

    #[must_use]
    pub const fn puller(&self) -> &Puller {
        &self.puller
    }

    #[must_use]
    pub const fn reconciler(&self) -> &ProxyReconciler {
        &self.reconciler
    }

    #[must_use]
    pub const fn digests(&self) -> &DigestScheduler {
        &self.digests
    }

    fn scheduler(&self, config: &NodeConfig) -> SyncScheduler {
        SyncScheduler::new(
            self.puller.clone(),
            self.reconciler.clone(),
            self.digests.clone(),
            Intervals {
                pull: config.sync.interval,
                proxy_check: config.sync.proxy_check_interval,
                digest: config.digest.interval,
            },
        )
    }
}

/// Runs the node until the server fails or the process is interrupted.
pub async fn start(config: NodeConfig) -> EyreResult<()> {
    info!(name = %config.node.name, home = %config.home, "Starting node");

    let index = BroadcastIndex::new(INDEX_CAPACITY);
    let events = index.subscribe();

    let node = Node::open(&config, Arc::new(index))?;

    let report = node.storage().repair_storage_folder()?;
    if !report.rematerialized.is_empty() || !report.removed.is_empty() {
        info!(
            rematerialized = report.rematerialized.len(),
            removed = report.removed.len(),
            "Storage folders repaired"
        );
    }

    let server = metashare_server::start(config.server.clone(), node.responder().clone());
    let scheduler = node.scheduler(&config).start();

    tokio::select! {
        result = server => result?,
        () = scheduler => {}
        () = log_index_events(events) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

/// Stands in for the search index until one is attached.
async fn log_index_events(mut events: broadcast::Receiver<IndexEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => debug!(?event, "Index event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Index listener lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
