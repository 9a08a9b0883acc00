//! Wire-level pieces of the sync protocol shared by both ends.

use metashare_folderstore::archive::{self, INVENTORY_ENTRY};
use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Query parameter carrying an offered protocol version. May repeat.
pub const PROTOCOL_PARAM: &str = "sync_protocol";

/// Response header carrying the negotiated protocol version.
pub const PROTOCOL_HEADER: &str = "x-metashare-sync-protocol";

/// Response header carrying the responding node's software version.
pub const NODE_VERSION_HEADER: &str = "x-metashare-node-version";

/// Picks the first requested version this node supports.
pub fn negotiate<'a>(requested: &[String], supported: &'a [String]) -> Result<&'a str, SyncError> {
    requested
        .iter()
        .find_map(|version| supported.iter().find(|s| *s == version))
        .map(String::as_str)
        .ok_or_else(|| SyncError::ProtocolNotSupported(requested.to_vec()))
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub id: StorageId,
    pub digest: Digest,
}

/// Packs an inventory document, sorted by identifier.
pub fn encode_inventory(mut entries: Vec<InventoryEntry>) -> eyre::Result<Vec<u8>> {
    entries.sort_by_key(|entry| entry.id);

    let document = serde_json::to_vec(&entries)?;

    Ok(archive::pack([(INVENTORY_ENTRY, &*document)])?)
}

pub fn decode_inventory(bytes: &[u8]) -> Result<Vec<InventoryEntry>, SyncError> {
    let mut files =
        archive::unpack(bytes).map_err(|err| SyncError::InvalidResponse(err.to_string()))?;

    let document = files.remove(INVENTORY_ENTRY).ok_or_else(|| {
        SyncError::InvalidResponse(format!("inventory archive has no `{INVENTORY_ENTRY}`"))
    })?;

    serde_json::from_slice(&document).map_err(|err| SyncError::InvalidResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(v: &[&str]) -> Vec<String> {
        v.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn test_negotiate_prefers_requested_order() {
        let supported = versions(&["1.0", "1.1"]);

        assert_eq!(negotiate(&versions(&["1.1", "1.0"]), &supported).unwrap(), "1.1");
        assert_eq!(negotiate(&versions(&["0.9", "1.0"]), &supported).unwrap(), "1.0");
    }

    #[test]
    fn test_negotiate_without_overlap() {
        let err = negotiate(&versions(&["2.0"]), &versions(&["1.0"])).unwrap_err();

        assert!(matches!(err, SyncError::ProtocolNotSupported(v) if v == ["2.0"]));
        assert!(negotiate(&[], &versions(&["1.0"])).is_err());
    }

    #[test]
    fn test_inventory_document_is_sorted() {
        let digest = Digest::from([1; 32]);
        let entries = vec![
            InventoryEntry { id: [9; 32].into(), digest },
            InventoryEntry { id: [3; 32].into(), digest },
        ];

        let decoded = decode_inventory(&encode_inventory(entries).unwrap()).unwrap();

        assert_eq!(
            decoded.iter().map(|e| e.id).collect::<Vec<_>>(),
            [StorageId::from([3; 32]), StorageId::from([9; 32])]
        );
    }
}
