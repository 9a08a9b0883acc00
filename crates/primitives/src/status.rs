use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Authority classification of a local copy.
#[derive(
    AsRefStr, Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CopyStatus {
    /// This node is the source of truth for the object.
    Master,
    /// Replicated from another node's master copy.
    Remote,
    /// Cached on behalf of a node this node proxies for.
    Proxy,
}

impl CopyStatus {
    #[must_use]
    pub const fn is_master(self) -> bool {
        matches!(self, Self::Master)
    }
}

/// Visibility of an object, both in the catalog and on the sync wire.
///
/// Variants are declared in lifecycle order so that `Ord` reflects how far an
/// object has advanced.
#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PublicationStatus {
    Internal,
    Ingested,
    Published,
}

impl PublicationStatus {
    /// Whether objects in this status have an on-disk folder and are offered to peers.
    #[must_use]
    pub const fn is_materialized(self) -> bool {
        matches!(self, Self::Ingested | Self::Published)
    }
}
