use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::PublicationStatus;
use metashare_storage::error::StorageError;
use metashare_storage::StorageManager;
use tracing::debug;

use crate::error::SyncError;
use crate::protocol::{encode_inventory, negotiate, InventoryEntry};

/// A packed inventory and the version it was negotiated for.
#[derive(Clone, Debug)]
pub struct InventoryResponse {
    pub protocol_version: String,
    pub archive: Vec<u8>,
}

/// Serves this node's exported objects to peers.
#[derive(Clone, Debug)]
pub struct Responder {
    storage: StorageManager,
    protocol_versions: Vec<String>,
}

impl Responder {
    #[must_use]
    pub const fn new(storage: StorageManager, protocol_versions: Vec<String>) -> Self {
        Self {
            storage,
            protocol_versions,
        }
    }

    pub fn inventory(&self, requested: &[String]) -> Result<InventoryResponse, SyncError> {
        let version = negotiate(requested, &self.protocol_versions)?;

        let entries: Vec<_> = self
            .storage
            .inventory()?
            .into_iter()
            .map(|(id, digest)| InventoryEntry { id, digest })
            .collect();

        debug!(count = entries.len(), version, "Serving inventory");

        let archive = encode_inventory(entries).map_err(StorageError::from)?;

        Ok(InventoryResponse {
            protocol_version: version.to_owned(),
            archive,
        })
    }

    pub fn export_object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError> {
        self.storage.export_archive(id).map_err(|err| match err {
            StorageError::NotAvailable(id) => SyncError::NotAvailable(id),
            StorageError::UnknownObject(id) => SyncError::UnknownObject(id),
            err => SyncError::Storage(err),
        })
    }

    /// Identifiers and digests of published objects.
    pub fn resource_list(&self) -> Result<Vec<(StorageId, Digest)>, SyncError> {
        let mut resources = Vec::new();

        for object in self.storage.list()? {
            if object.deleted || object.publication_status != PublicationStatus::Published {
                continue;
            }

            if let Some(digest) = object.digest_checksum {
                resources.push((object.identifier, digest));
            }
        }

        Ok(resources)
    }
}
