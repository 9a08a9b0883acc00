use chrono::{DateTime, Utc};
use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::{CopyStatus, PublicationStatus};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, Identity, Json};
use crate::key::{ObjectKey, RecordKey};

/// The persisted envelope of a storage object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct StorageObject {
    pub identifier: StorageId,
    pub revision: u32,
    pub publication_status: PublicationStatus,
    pub copy_status: CopyStatus,
    pub deleted: bool,
    pub digest_checksum: Option<Digest>,
    pub digest_modified: Option<DateTime<Utc>>,
    pub digest_last_checked: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub source_node: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl StorageObject {
    /// A fresh envelope at revision 1 with no digest.
    #[must_use]
    pub const fn new(
        identifier: StorageId,
        copy_status: CopyStatus,
        publication_status: PublicationStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            revision: 1,
            publication_status,
            copy_status,
            deleted: false,
            digest_checksum: None,
            digest_modified: None,
            digest_last_checked: None,
            source_url: None,
            source_node: None,
            created: now,
            modified: now,
        }
    }

    /// Whether the object has a storage folder and is offered to peers.
    #[must_use]
    pub const fn is_exported(&self) -> bool {
        self.publication_status.is_materialized() && !self.deleted
    }
}

/// Canonical bytes of the record owned by a storage object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordData(Vec<u8>);

impl RecordData {
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for RecordData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for RecordData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Entry for ObjectKey {
    type Codec = Json<StorageObject>;
}

impl Entry for RecordKey {
    type Codec = Identity<RecordData>;
}
