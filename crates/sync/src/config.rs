//! Synchronization settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use url::Url;

/// Protocol versions this implementation can speak, most preferred first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["1.0"];

/// Default timeout of a single request to a peer (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default period of outbound pulls (1 hour)
pub const DEFAULT_INTERVAL_MS: u64 = 3_600_000;

/// Default period of proxy reconciliation (1 hour)
pub const DEFAULT_PROXY_CHECK_INTERVAL_MS: u64 = 3_600_000;

/// Default minimum digest age before a re-check (1 hour)
pub const DEFAULT_DIGEST_MIN_AGE_MS: u64 = 3_600_000;

/// Default maximum digest age (1 day)
pub const DEFAULT_DIGEST_MAX_AGE_MS: u64 = 86_400_000;

/// Default period of the digest freshness pass (1 hour)
pub const DEFAULT_DIGEST_INTERVAL_MS: u64 = 3_600_000;

/// A peer this node pulls from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct NodeDescriptor {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl NodeDescriptor {
    #[must_use]
    pub const fn new(display_name: String, url: Url) -> Self {
        Self {
            display_name,
            description: String::new(),
            url,
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SyncConfig {
    /// Versions offered to and accepted from peers.
    pub protocol_versions: Vec<String>,

    /// Timeout of every request to a peer.
    pub timeout: Duration,

    /// Period of outbound pulls.
    pub interval: Duration,

    /// Period of proxy reconciliation.
    pub proxy_check_interval: Duration,

    /// Peers mirrored as remote copies.
    pub core_nodes: BTreeMap<String, NodeDescriptor>,

    /// Peers mirrored as proxy copies.
    pub proxied_nodes: BTreeMap<String, NodeDescriptor>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            protocol_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(|&v| v.to_owned())
                .collect(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            proxy_check_interval: Duration::from_millis(DEFAULT_PROXY_CHECK_INTERVAL_MS),
            core_nodes: BTreeMap::new(),
            proxied_nodes: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_core_node(mut self, name: &str, node: NodeDescriptor) -> Self {
        let _ignored = self.core_nodes.insert(name.to_owned(), node);
        self
    }

    #[must_use]
    pub fn with_proxied_node(mut self, name: &str, node: NodeDescriptor) -> Self {
        let _ignored = self.proxied_nodes.insert(name.to_owned(), node);
        self
    }
}

#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct DigestConfig {
    pub min_age: Duration,
    pub max_age: Duration,
    pub interval: Duration,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            min_age: Duration::from_millis(DEFAULT_DIGEST_MIN_AGE_MS),
            max_age: Duration::from_millis(DEFAULT_DIGEST_MAX_AGE_MS),
            interval: Duration::from_millis(DEFAULT_DIGEST_INTERVAL_MS),
        }
    }
}

impl DigestConfig {
    #[must_use]
    pub const fn new(min_age: Duration, max_age: Duration, interval: Duration) -> Self {
        Self {
            min_age,
            max_age,
            interval,
        }
    }

    /// Digests checked more recently than this are skipped.
    #[must_use]
    pub fn check_threshold(&self) -> Duration {
        (self.max_age / 2).max(self.min_age)
    }
}
