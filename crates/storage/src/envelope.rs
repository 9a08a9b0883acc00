//! The exported halves of a storage object envelope.

use chrono::{DateTime, Utc};
use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::{CopyStatus, PublicationStatus};
use metashare_store::types::StorageObject;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Envelope fields shared with peers and covered by the digest.
///
/// Field order is part of the digest input and must not change.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GlobalEnvelope {
    pub identifier: StorageId,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub revision: u32,
    pub publication_status: PublicationStatus,
    pub source_url: Option<String>,
}

impl GlobalEnvelope {
    #[must_use]
    pub fn of(object: &StorageObject) -> Self {
        Self {
            identifier: object.identifier,
            created: object.created,
            modified: object.modified,
            revision: object.revision,
            publication_status: object.publication_status,
            source_url: object.source_url.clone(),
        }
    }

    pub fn to_bytes(&self) -> eyre::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(bytes).map_err(StorageError::malformed)
    }
}

/// Envelope fields that only make sense on this node. Never shipped.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LocalEnvelope {
    pub copy_status: CopyStatus,
    pub source_node: Option<String>,
    pub digest_checksum: Option<Digest>,
    pub digest_modified: Option<DateTime<Utc>>,
    pub digest_last_checked: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl LocalEnvelope {
    #[must_use]
    pub fn of(object: &StorageObject) -> Self {
        Self {
            copy_status: object.copy_status,
            source_node: object.source_node.clone(),
            digest_checksum: object.digest_checksum,
            digest_modified: object.digest_modified,
            digest_last_checked: object.digest_last_checked,
            deleted: object.deleted,
        }
    }

    pub fn to_bytes(&self) -> eyre::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(bytes).map_err(StorageError::malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_field_order() {
        let object = StorageObject::new(
            [0xab; 32].into(),
            CopyStatus::Master,
            PublicationStatus::Ingested,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );

        let bytes = GlobalEnvelope::of(&object).to_bytes().unwrap();

        let expected = format!(
            concat!(
                r#"{{"identifier":"{}","created":"2023-11-14T22:13:20Z","#,
                r#""modified":"2023-11-14T22:13:20Z","revision":1,"#,
                r#""publication_status":"ingested","source_url":null}}"#
            ),
            "ab".repeat(32)
        );

        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_global_roundtrip_is_stable() {
        let mut object = StorageObject::new(
            StorageId::generate(),
            CopyStatus::Remote,
            PublicationStatus::Published,
            Utc::now(),
        );
        object.source_url = Some("http://node.example/".to_owned());

        let bytes = GlobalEnvelope::of(&object).to_bytes().unwrap();
        let parsed = GlobalEnvelope::from_slice(&bytes).unwrap();

        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }
}
