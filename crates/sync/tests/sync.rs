#![allow(unused_crate_dependencies, reason = "shared dev-dependencies")]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use chrono::Duration as TimeDelta;
use metashare_folderstore::config::FolderStoreConfig;
use metashare_folderstore::{FolderStore, ARCHIVE_FILE, LOCAL_FILE};
use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::{CopyStatus, PublicationStatus};
use metashare_storage::config::LocalNode;
use metashare_storage::envelope::LocalEnvelope;
use metashare_storage::error::StorageError;
use metashare_storage::record::Record;
use metashare_storage::StorageManager;
use metashare_store::db::InMemoryDB;
use metashare_store::key::ObjectKey;
use metashare_store::types::StorageObject;
use metashare_store::Store;
use metashare_sync::config::{DigestConfig, NodeDescriptor, SyncConfig};
use metashare_sync::digest::DigestScheduler;
use metashare_sync::error::SyncError;
use metashare_sync::peer::{
    HttpPeer, LocalPeer, Peer, PeerConnector, PeerInventory, MAX_RESPONSE_SIZE,
};
use metashare_sync::puller::Puller;
use metashare_sync::reconcile::ProxyReconciler;
use metashare_sync::responder::Responder;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::Duration;

struct Node {
    _dir: TempDir,
    store: Store,
    storage: StorageManager,
}

impl Node {
    fn new(name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("storage")).unwrap();

        let store = Store::new(Arc::new(InMemoryDB::new()));

        let storage = StorageManager::new(
            store.clone(),
            FolderStore::open(&FolderStoreConfig::new(path)).unwrap(),
            LocalNode::new(name.to_owned(), Some(format!("http://{name}.example/"))),
        );

        Self {
            _dir: dir,
            store,
            storage,
        }
    }

    fn responder(&self) -> Responder {
        Responder::new(self.storage.clone(), vec!["1.0".to_owned()])
    }

    fn peer(&self) -> LocalPeer {
        LocalPeer::new(self.responder())
    }

    fn publish(&self, name: &str, status: PublicationStatus) -> StorageId {
        let id = self.storage.create(&record(name)).unwrap().identifier;

        if status != PublicationStatus::Internal {
            let _object = self
                .storage
                .transition_publication_status(&id, status)
                .unwrap();
        }

        id
    }
}

fn record(name: &str) -> Record {
    let Value::Object(fields) = json!({ "resourceName": name }) else {
        unreachable!()
    };

    Record::new(fields)
}

fn descriptor(name: &str) -> NodeDescriptor {
    NodeDescriptor::new(
        name.to_owned(),
        format!("http://{name}.example/").parse().unwrap(),
    )
}

fn puller(node: &Node, config: SyncConfig, peers: Peers) -> Puller {
    Puller::new(node.storage.clone(), Arc::new(config), Arc::new(peers))
}

/// Overwrites the stored envelope behind the manager's back.
fn tamper(node: &Node, id: &StorageId, edit: impl FnOnce(&mut StorageObject)) {
    let handle = node.store.handle();
    let key = ObjectKey::new(*id);

    let mut object = handle.get(&key).unwrap().unwrap();
    edit(&mut object);

    handle.put(&key, &object).unwrap();
}

fn digests(node: &Node) -> DigestScheduler {
    DigestScheduler::new(
        node.storage.clone(),
        DigestConfig::new(
            Duration::from_secs(3600),
            Duration::from_secs(4 * 3600),
            Duration::from_secs(60),
        ),
    )
}

/// Resolves configured node names to in-process responders.
#[derive(Default)]
struct Peers(BTreeMap<String, Responder>);

impl Peers {
    fn with(mut self, name: &str, node: &Node) -> Self {
        let _ignored = self.0.insert(name.to_owned(), node.responder());
        self
    }
}

impl PeerConnector for Peers {
    fn connect(&self, name: &str, _node: &NodeDescriptor) -> Result<Box<dyn Peer>, SyncError> {
        let responder = self.0.get(name).ok_or(SyncError::Forbidden)?;

        Ok(Box::new(LocalPeer::new(responder.clone())))
    }
}

#[test]
fn test_inventory_lists_only_exported_objects() {
    let node = Node::new("a");

    let ingested = node.publish("one", PublicationStatus::Ingested);
    let published = node.publish("two", PublicationStatus::Published);
    let _internal = node.publish("three", PublicationStatus::Internal);
    let deleted = node.publish("four", PublicationStatus::Published);
    let _deleted = node.storage.mark_deleted(&deleted).unwrap();

    let response = node.responder().inventory(&["1.0".to_owned()]).unwrap();

    assert_eq!(response.protocol_version, "1.0");

    let listed: Vec<_> = metashare_sync::protocol::decode_inventory(&response.archive)
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect();

    let mut expected = vec![ingested, published];
    expected.sort();

    assert_eq!(listed, expected);

    let resources = node.responder().resource_list().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].0, published);
}

#[test]
fn test_responder_refusals() {
    let node = Node::new("a");
    let internal = node.publish("x", PublicationStatus::Internal);

    assert!(matches!(
        node.responder().inventory(&["9.9".to_owned()]).unwrap_err(),
        SyncError::ProtocolNotSupported(_)
    ));
    assert!(matches!(
        node.responder().export_object(&internal).unwrap_err(),
        SyncError::NotAvailable(_)
    ));
    assert!(matches!(
        node.responder()
            .export_object(&StorageId::generate())
            .unwrap_err(),
        SyncError::UnknownObject(_)
    ));
}

#[tokio::test]
async fn test_pull_mirrors_remote_inventory() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let first = upstream.publish("one", PublicationStatus::Published);
    let second = upstream.publish("two", PublicationStatus::Ingested);

    let puller = puller(&local, SyncConfig::default(), Peers::default());
    let peer = upstream.peer();
    let node = descriptor("central");

    let report = puller
        .pull_node("central", &node, CopyStatus::Remote, &peer)
        .await
        .unwrap();

    assert_eq!((report.created, report.updated, report.unchanged), (2, 0, 0));
    assert_eq!(report.failed, 0);

    for id in [first, second] {
        let theirs = upstream.storage.get(&id).unwrap().unwrap();
        let ours = local.storage.get(&id).unwrap().unwrap();

        assert_eq!(ours.copy_status, CopyStatus::Remote);
        assert_eq!(ours.source_node.as_deref(), Some("central"));
        assert_eq!(ours.digest_checksum, theirs.digest_checksum);
        assert_eq!(ours.revision, theirs.revision);
    }

    let report = puller
        .pull_node("central", &node, CopyStatus::Remote, &peer)
        .await
        .unwrap();

    assert_eq!((report.created, report.updated, report.unchanged), (0, 0, 2));

    let _edited = upstream.storage.update_content(&first, &record("edited")).unwrap();

    let report = puller
        .pull_node("central", &node, CopyStatus::Remote, &peer)
        .await
        .unwrap();

    assert_eq!((report.created, report.updated, report.unchanged), (0, 1, 1));
    assert_eq!(local.storage.record(&first).unwrap().unwrap(), record("edited"));
}

#[tokio::test]
async fn test_pull_never_overwrites_local_master() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let id = upstream.publish("theirs", PublicationStatus::Published);

    // The local node holds its own master copy of the same object.
    let source = upstream.storage.folders().folder(&id);
    let target = local.storage.folders().folder(&id);
    std::fs::create_dir_all(&target).unwrap();
    for entry in source.read_dir_utf8().unwrap() {
        let entry = entry.unwrap();
        let _copied = std::fs::copy(entry.path(), target.join(entry.file_name())).unwrap();
    }
    let _restored = local
        .storage
        .restore_from_folder(&id, CopyStatus::Master)
        .unwrap();

    let _edited = upstream.storage.update_content(&id, &record("changed")).unwrap();

    let report = puller(&local, SyncConfig::default(), Peers::default())
        .pull_node("central", &descriptor("central"), CopyStatus::Remote, &upstream.peer())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(local.storage.record(&id).unwrap().unwrap(), record("theirs"));
    assert_eq!(
        local.storage.get(&id).unwrap().unwrap().copy_status,
        CopyStatus::Master
    );
}

#[tokio::test]
async fn test_replica_keeps_converging_after_refused_local_edit() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let id = upstream.publish("x", PublicationStatus::Ingested);

    let puller = puller(&local, SyncConfig::default(), Peers::default());
    let peer = upstream.peer();
    let node = descriptor("central");

    let report = puller
        .pull_node("central", &node, CopyStatus::Remote, &peer)
        .await
        .unwrap();
    assert_eq!(report.created, 1);

    assert!(matches!(
        local
            .storage
            .transition_publication_status(&id, PublicationStatus::Published)
            .unwrap_err(),
        StorageError::NotMaster(_)
    ));

    for _ in 0..3 {
        let report = puller
            .pull_node("central", &node, CopyStatus::Remote, &peer)
            .await
            .unwrap();

        assert_eq!((report.updated, report.unchanged), (0, 1));
    }

    let theirs = upstream.storage.get(&id).unwrap().unwrap();
    let ours = local.storage.get(&id).unwrap().unwrap();

    assert_eq!(ours.revision, theirs.revision);
    assert_eq!(ours.digest_checksum, theirs.digest_checksum);
    assert_eq!(ours.publication_status, PublicationStatus::Ingested);
}

/// Advertises a digest that does not match what it serves.
struct LyingPeer(LocalPeer);

#[async_trait]
impl Peer for LyingPeer {
    async fn inventory(&self, versions: &[String]) -> Result<PeerInventory, SyncError> {
        let mut inventory = self.0.inventory(versions).await?;

        for entry in &mut inventory.entries {
            entry.digest = Digest::from([0; 32]);
        }

        Ok(inventory)
    }

    async fn object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError> {
        self.0.object(id).await
    }
}

#[tokio::test]
async fn test_digest_mismatch_is_discarded() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let id = upstream.publish("x", PublicationStatus::Published);

    let report = puller(&local, SyncConfig::default(), Peers::default())
        .pull_node(
            "central",
            &descriptor("central"),
            CopyStatus::Remote,
            &LyingPeer(upstream.peer()),
        )
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 0);
    assert!(local.storage.get(&id).unwrap().is_none());
    assert!(!local.storage.folders().exists(&id));
}

#[tokio::test]
async fn test_pull_reports_stale_copies() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let kept = upstream.publish("kept", PublicationStatus::Published);
    let gone = upstream.publish("gone", PublicationStatus::Published);

    let puller = puller(&local, SyncConfig::default(), Peers::default());
    let node = descriptor("central");

    let _first = puller
        .pull_node("central", &node, CopyStatus::Remote, &upstream.peer())
        .await
        .unwrap();

    assert!(upstream.storage.purge(&gone).unwrap());

    let report = puller
        .pull_node("central", &node, CopyStatus::Remote, &upstream.peer())
        .await
        .unwrap();

    assert_eq!(report.stale, [gone]);
    assert!(local.storage.get(&gone).unwrap().is_some());
    assert!(local.storage.get(&kept).unwrap().is_some());
}

/// Holds its inventory back until released.
struct GatedPeer {
    inner: LocalPeer,
    gate: Arc<Notify>,
}

#[async_trait]
impl Peer for GatedPeer {
    async fn inventory(&self, versions: &[String]) -> Result<PeerInventory, SyncError> {
        self.gate.notified().await;
        self.inner.inventory(versions).await
    }

    async fn object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError> {
        self.inner.object(id).await
    }
}

#[tokio::test]
async fn test_passes_against_one_node_never_overlap() {
    let upstream = Node::new("central");
    let local = Node::new("local");

    let _id = upstream.publish("x", PublicationStatus::Published);

    let puller = puller(&local, SyncConfig::default(), Peers::default());
    let node = descriptor("central");
    let gate = Arc::new(Notify::new());
    let peer = GatedPeer {
        inner: upstream.peer(),
        gate: Arc::clone(&gate),
    };

    let (first, second, ()) = tokio::join!(
        puller.pull_node("central", &node, CopyStatus::Remote, &peer),
        puller.pull_node("central", &node, CopyStatus::Remote, &peer),
        async { gate.notify_one() },
    );

    assert_eq!(first.unwrap().created, 1);
    assert!(matches!(second.unwrap_err(), SyncError::Busy(name) if name == "central"));
}

#[tokio::test]
async fn test_oversized_peer_response_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _peer) = listener.accept().await.unwrap();

        let mut request = [0; 4096];
        let _read = socket.read(&mut request).await.unwrap();

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/gzip\r\ncontent-length: {}\r\n\r\n",
            MAX_RESPONSE_SIZE + 1
        );
        socket.write_all(head.as_bytes()).await.unwrap();
    });

    let node = NodeDescriptor::new("big".to_owned(), format!("http://{addr}/").parse().unwrap());
    let peer = HttpPeer::new(node, Duration::from_secs(5)).unwrap();

    let err = peer.object(&StorageId::generate()).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidResponse(_)), "{err}");

    server.await.unwrap();
}

struct SilentPeer;

#[async_trait]
impl Peer for SilentPeer {
    async fn inventory(&self, _versions: &[String]) -> Result<PeerInventory, SyncError> {
        std::future::pending().await
    }

    async fn object(&self, _id: &StorageId) -> Result<Vec<u8>, SyncError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_peer_times_out() {
    let local = Node::new("local");

    let mut config = SyncConfig::default();
    config.timeout = Duration::from_millis(50);

    let err = puller(&local, config, Peers::default())
        .pull_node("central", &descriptor("central"), CopyStatus::Remote, &SilentPeer)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_check_proxied_nodes() {
    let node1 = Node::new("node1");
    let node2 = Node::new("node2");
    let local = Node::new("local");

    let from_node1 = [
        node1.publish("a", PublicationStatus::Published),
        node1.publish("b", PublicationStatus::Ingested),
    ];
    let from_node2 = node2.publish("c", PublicationStatus::Published);
    let master = local.publish("ours", PublicationStatus::Published);

    let config = SyncConfig::default()
        .with_proxied_node("node1", descriptor("node1"))
        .with_proxied_node("node2", descriptor("node2"));

    let results = puller(
        &local,
        config,
        Peers::default().with("node1", &node1).with("node2", &node2),
    )
    .pull_all()
    .await;

    assert_eq!(results.len(), 2);
    for (_name, result) in &results {
        assert_eq!(result.as_ref().unwrap().failed, 0);
    }

    for id in from_node1.iter().chain([&from_node2]) {
        assert_eq!(
            local.storage.get(id).unwrap().unwrap().copy_status,
            CopyStatus::Proxy
        );
    }

    let config = SyncConfig::default().with_proxied_node("node2", descriptor("node2"));
    let reconciler = ProxyReconciler::new(local.storage.clone(), Arc::new(config));

    let mut purged = reconciler.check_proxied_nodes().unwrap();
    purged.sort();

    let mut expected = from_node1.to_vec();
    expected.sort();

    assert_eq!(purged, expected);

    for id in &from_node1 {
        assert!(local.storage.get(id).unwrap().is_none());
        assert!(!local.storage.folders().exists(id));
    }

    assert!(local.storage.get(&from_node2).unwrap().is_some());
    assert!(local.storage.folders().exists(&from_node2));
    assert!(local.storage.get(&master).unwrap().is_some());

    assert!(reconciler.check_proxied_nodes().unwrap().is_empty());
}

#[test]
fn test_update_digests_respects_check_age() {
    let node = Node::new("a");
    let id = node.publish("x", PublicationStatus::Published);

    let scheduler = digests(&node);

    let before = node.storage.get(&id).unwrap().unwrap();
    let checked = before.digest_last_checked.unwrap();

    for _ in 0..2 {
        let report = scheduler.run_at(checked + TimeDelta::minutes(10)).unwrap();

        assert_eq!((report.checked, report.skipped), (0, 1));
        assert_eq!(
            node.storage.get(&id).unwrap().unwrap().digest_last_checked,
            Some(checked)
        );
    }

    // Exactly one threshold old is not yet older than it.
    let report = scheduler.run_at(checked + TimeDelta::hours(2)).unwrap();
    assert_eq!((report.checked, report.skipped), (0, 1));

    let later = checked + TimeDelta::hours(3);
    let report = scheduler.run_at(later).unwrap();

    assert_eq!((report.checked, report.changed, report.skipped), (1, 0, 0));

    let after = node.storage.get(&id).unwrap().unwrap();

    assert_eq!(after.digest_last_checked, Some(later));
    assert_eq!(after.digest_modified, before.digest_modified);
    assert_eq!(after.digest_checksum, before.digest_checksum);
}

#[test]
fn test_update_digests_repairs_drifted_digest() {
    let node = Node::new("a");
    let id = node.publish("x", PublicationStatus::Published);

    let before = node.storage.get(&id).unwrap().unwrap();
    let actual = before.digest_checksum.unwrap();
    let checked = before.digest_last_checked.unwrap();

    tamper(&node, &id, |object| {
        object.digest_checksum = Some(Digest::from([7; 32]));
    });

    let folder = node.storage.folders().folder(&id);
    std::fs::remove_file(folder.join(ARCHIVE_FILE)).unwrap();

    let later = checked + TimeDelta::hours(3);
    let report = digests(&node).run_at(later).unwrap();

    assert_eq!((report.checked, report.changed, report.failed), (1, 1, 0));

    let after = node.storage.get(&id).unwrap().unwrap();

    assert_eq!(after.digest_checksum, Some(actual));
    assert_eq!(after.digest_modified, Some(later));
    assert_eq!(after.digest_last_checked, Some(later));

    assert!(folder.join(ARCHIVE_FILE).exists());

    let local = LocalEnvelope::from_slice(&std::fs::read(folder.join(LOCAL_FILE)).unwrap()).unwrap();
    assert_eq!(local.digest_checksum, Some(actual));
    assert_eq!(local.digest_modified, Some(later));
}

#[test]
fn test_update_digests_checks_never_checked_objects() {
    let node = Node::new("a");
    let id = node.publish("x", PublicationStatus::Ingested);

    let before = node.storage.get(&id).unwrap().unwrap();

    tamper(&node, &id, |object| object.digest_last_checked = None);

    let now = before.digest_last_checked.unwrap() + TimeDelta::seconds(1);
    let report = digests(&node).run_at(now).unwrap();

    assert_eq!((report.checked, report.changed, report.skipped), (1, 0, 0));

    let after = node.storage.get(&id).unwrap().unwrap();

    assert_eq!(after.digest_last_checked, Some(now));
    assert_eq!(after.digest_checksum, before.digest_checksum);
    assert_eq!(after.digest_modified, before.digest_modified);
}
