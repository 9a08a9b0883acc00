use core::time::Duration;
use std::collections::BTreeMap;
use std::fs::{read_to_string, write};
use std::net::SocketAddr;

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use metashare_server::config::{AuthConfig, SyncUser};
use metashare_storage::config::LocalNode;
use metashare_sync::config::{
    DigestConfig, NodeDescriptor, SyncConfig as PeerSyncConfig, DEFAULT_DIGEST_INTERVAL_MS,
    DEFAULT_DIGEST_MAX_AGE_MS, DEFAULT_DIGEST_MIN_AGE_MS, DEFAULT_INTERVAL_MS,
    DEFAULT_PROXY_CHECK_INTERVAL_MS, DEFAULT_TIMEOUT_MS, SUPPORTED_PROTOCOL_VERSIONS,
};
use serde::{Deserialize, Serialize};

pub mod hints;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    pub node: LocalNode,

    pub server: ServerConfig,

    pub datastore: DataStoreConfig,

    pub storage: StorageConfig,

    pub sync: SyncConfig,

    #[serde(default)]
    pub digest: DigestSection,
}

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ServerConfig {
    pub listen: Vec<SocketAddr>,
}

impl ServerConfig {
    #[must_use]
    pub const fn new(listen: Vec<SocketAddr>) -> Self {
        Self { listen }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct DataStoreConfig {
    pub path: Utf8PathBuf,
}

impl DataStoreConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

/// Root of the storage folders.
#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct StorageConfig {
    pub path: Utf8PathBuf,
}

impl StorageConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct SyncConfig {
    #[serde(default = "metashare_primitives::common::bool_true")]
    pub require_auth: bool,

    #[serde(default = "supported_protocol_versions")]
    pub protocol_versions: Vec<String>,

    #[serde(
        rename = "timeout_ms",
        with = "serde_duration",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    #[serde(
        rename = "interval_ms",
        with = "serde_duration",
        default = "default_interval"
    )]
    pub interval: Duration,

    #[serde(
        rename = "proxy_check_interval_ms",
        with = "serde_duration",
        default = "default_proxy_check_interval"
    )]
    pub proxy_check_interval: Duration,

    #[serde(default)]
    pub users: BTreeMap<String, SyncUser>,

    #[serde(default)]
    pub core_nodes: BTreeMap<String, NodeDescriptor>,

    #[serde(default)]
    pub proxied_nodes: BTreeMap<String, NodeDescriptor>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            protocol_versions: supported_protocol_versions(),
            timeout: default_timeout(),
            interval: default_interval(),
            proxy_check_interval: default_proxy_check_interval(),
            users: BTreeMap::new(),
            core_nodes: BTreeMap::new(),
            proxied_nodes: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct DigestSection {
    #[serde(rename = "min_age_ms", with = "serde_duration")]
    pub min_age: Duration,
    #[serde(rename = "max_age_ms", with = "serde_duration")]
    pub max_age: Duration,
    #[serde(rename = "interval_ms", with = "serde_duration")]
    pub interval: Duration,
}

impl Default for DigestSection {
    fn default() -> Self {
        Self {
            min_age: Duration::from_millis(DEFAULT_DIGEST_MIN_AGE_MS),
            max_age: Duration::from_millis(DEFAULT_DIGEST_MAX_AGE_MS),
            interval: Duration::from_millis(DEFAULT_DIGEST_INTERVAL_MS),
        }
    }
}

fn supported_protocol_versions() -> Vec<String> {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .map(|&version| version.to_owned())
        .collect()
}

const fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS)
}

const fn default_interval() -> Duration {
    Duration::from_millis(DEFAULT_INTERVAL_MS)
}

const fn default_proxy_check_interval() -> Duration {
    Duration::from_millis(DEFAULT_PROXY_CHECK_INTERVAL_MS)
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        node: LocalNode,
        server: ServerConfig,
        datastore: DataStoreConfig,
        storage: StorageConfig,
        sync: SyncConfig,
        digest: DigestSection,
    ) -> Self {
        Self {
            node,
            server,
            datastore,
            storage,
            sync,
            digest,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content).wrap_err_with(|| format!("invalid configuration in {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Settings of the outbound pull machinery.
    #[must_use]
    pub fn peer_sync(&self) -> PeerSyncConfig {
        let mut config = PeerSyncConfig::default();

        config.protocol_versions.clone_from(&self.sync.protocol_versions);
        config.timeout = self.sync.timeout;
        config.interval = self.sync.interval;
        config.proxy_check_interval = self.sync.proxy_check_interval;
        config.core_nodes.clone_from(&self.sync.core_nodes);
        config.proxied_nodes.clone_from(&self.sync.proxied_nodes);

        config
    }

    #[must_use]
    pub const fn digest(&self) -> DigestConfig {
        DigestConfig::new(
            self.digest.min_age,
            self.digest.max_age,
            self.digest.interval,
        )
    }

    /// Who may call the sync api.
    #[must_use]
    pub fn auth(&self) -> AuthConfig {
        AuthConfig::new(self.sync.require_auth, self.sync.users.clone())
    }

    /// Renders one dotted key, e.g. `sync.timeout_ms`.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        let value = match key {
            "node.name" => self.node.name.clone(),
            "node.url" => self.node.url.clone().unwrap_or_default(),
            "server.listen" => self
                .server
                .listen
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            "datastore.path" => self.datastore.path.to_string(),
            "storage.path" => self.storage.path.to_string(),
            "sync.require_auth" => self.sync.require_auth.to_string(),
            "sync.protocol_versions" => self.sync.protocol_versions.join(", "),
            "sync.timeout_ms" => self.sync.timeout.as_millis().to_string(),
            "sync.interval_ms" => self.sync.interval.as_millis().to_string(),
            "sync.proxy_check_interval_ms" => {
                self.sync.proxy_check_interval.as_millis().to_string()
            }
            "sync.users" => names(&self.sync.users),
            "sync.core_nodes" => names(&self.sync.core_nodes),
            "sync.proxied_nodes" => names(&self.sync.proxied_nodes),
            "digest.min_age_ms" => self.digest.min_age.as_millis().to_string(),
            "digest.max_age_ms" => self.digest.max_age.as_millis().to_string(),
            "digest.interval_ms" => self.digest.interval.as_millis().to_string(),
            _ => return None,
        };

        Some(value)
    }
}

fn names<V>(map: &BTreeMap<String, V>) -> String {
    map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
