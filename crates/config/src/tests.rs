use camino::Utf8Path;
use metashare_server::auth::hash_password;
use tempfile::TempDir;
use url::Url;

use super::*;

const SAMPLE: &str = r#"
[node]
name = "node1"
url = "http://localhost:2529/"

[server]
listen = ["127.0.0.1:2529"]

[datastore]
path = "data"

[storage]
path = "storage"

[sync]
timeout_ms = 5000

[sync.users.syncuser]
password_sha256 = "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"

[sync.core_nodes.central]
display_name = "Central"
url = "https://central.example.org/"
username = "syncuser"
password = "secret"

[sync.proxied_nodes.partner]
display_name = "Partner"
description = "A partner catalog"
url = "https://partner.example.org/"
"#;

#[test]
fn test_parse_with_defaults() {
    let config: ConfigFile = toml::from_str(SAMPLE).unwrap();

    assert_eq!(config.node.name, "node1");
    assert!(config.sync.require_auth);
    assert_eq!(config.sync.protocol_versions, ["1.0"]);
    assert_eq!(config.sync.timeout, Duration::from_secs(5));
    assert_eq!(config.sync.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
    assert_eq!(
        config.digest.max_age,
        Duration::from_millis(DEFAULT_DIGEST_MAX_AGE_MS)
    );

    assert_eq!(
        config.sync.users["syncuser"].password_sha256,
        hash_password("secret")
    );

    let peers = config.peer_sync();

    assert_eq!(peers.timeout, Duration::from_secs(5));
    assert_eq!(
        peers.core_nodes["central"].username.as_deref(),
        Some("syncuser")
    );
    assert_eq!(peers.proxied_nodes["partner"].description, "A partner catalog");
    assert!(peers.proxied_nodes["partner"].password.is_none());

    let auth = config.auth();
    assert!(auth.require_auth);
    assert!(auth.users.contains_key("syncuser"));

    assert_eq!(config.get_value("sync.core_nodes").as_deref(), Some("central"));
    assert_eq!(config.get_value("sync.timeout_ms").as_deref(), Some("5000"));
    assert_eq!(config.get_value("nope"), None);
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let home = Utf8Path::from_path(dir.path()).unwrap();

    assert!(!ConfigFile::exists(home));

    let mut sync = SyncConfig::default();
    let _ignored = sync.proxied_nodes.insert(
        "partner".to_owned(),
        NodeDescriptor::new(
            "Partner".to_owned(),
            Url::parse("https://partner.example.org/").unwrap(),
        ),
    );

    let config = ConfigFile::new(
        LocalNode::new("node1".to_owned(), None),
        ServerConfig::new(vec!["127.0.0.1:2529".parse().unwrap()]),
        DataStoreConfig::new("data".into()),
        StorageConfig::new("storage".into()),
        sync,
        DigestSection::default(),
    );

    config.save(home).unwrap();

    assert!(ConfigFile::exists(home));

    let loaded = ConfigFile::load(home).unwrap();

    assert_eq!(loaded.node, config.node);
    assert_eq!(loaded.server.listen, config.server.listen);
    assert_eq!(loaded.storage.path, "storage");
    assert_eq!(loaded.sync.proxied_nodes, config.sync.proxied_nodes);
    assert_eq!(loaded.digest().check_threshold(), config.digest().check_threshold());
}

#[test]
fn test_every_hint_names_a_key() {
    let config: ConfigFile = toml::from_str(SAMPLE).unwrap();

    for hint in hints::CONFIG_HINTS {
        assert!(config.get_value(hint.key).is_some(), "{}", hint.key);
    }
}
