use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 2529;
pub const DEFAULT_ADDRS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

/// An account holding the sync capability.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SyncUser {
    /// Lowercase hex SHA-256 of the password.
    pub password_sha256: String,
}

impl SyncUser {
    #[must_use]
    pub const fn new(password_sha256: String) -> Self {
        Self { password_sha256 }
    }
}

#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct AuthConfig {
    /// When unset, sync endpoints answer anonymous callers.
    pub require_auth: bool,
    pub users: BTreeMap<String, SyncUser>,
}

impl AuthConfig {
    #[must_use]
    pub const fn new(require_auth: bool, users: BTreeMap<String, SyncUser>) -> Self {
        Self {
            require_auth,
            users,
        }
    }
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ServerConfig {
    pub listen: Vec<SocketAddr>,

    pub auth: AuthConfig,

    /// Reported to peers in every sync response.
    pub node_version: String,
}

impl ServerConfig {
    #[must_use]
    pub const fn new(listen: Vec<SocketAddr>, auth: AuthConfig, node_version: String) -> Self {
        Self {
            listen,
            auth,
            node_version,
        }
    }
}

#[must_use]
pub fn default_addrs() -> Vec<SocketAddr> {
    DEFAULT_ADDRS
        .into_iter()
        .map(|addr| SocketAddr::from((addr, DEFAULT_PORT)))
        .collect()
}
