use chrono::{DateTime, Utc};
use metashare_folderstore::FolderExports;
use metashare_primitives::digest::{compute_digest, Digest};
use metashare_store::types::StorageObject;

use crate::envelope::{GlobalEnvelope, LocalEnvelope};
use crate::record::Record;

/// The shipped exports of an object and the digest over them.
#[derive(Debug)]
pub(crate) struct Rendered {
    pub metadata: Vec<u8>,
    pub global: Vec<u8>,
    pub digest: Digest,
}

pub(crate) fn render(object: &StorageObject, record: &Record) -> eyre::Result<Rendered> {
    let metadata = record.export()?;
    let global = GlobalEnvelope::of(object).to_bytes()?;

    let digest = compute_digest(&metadata, &global)?;

    Ok(Rendered {
        metadata,
        global,
        digest,
    })
}

/// Records a freshly computed digest. Returns whether the value changed.
pub(crate) fn stamp_digest(object: &mut StorageObject, digest: Digest, now: DateTime<Utc>) -> bool {
    let changed = object.digest_checksum != Some(digest);

    if changed {
        object.digest_checksum = Some(digest);
        object.digest_modified = Some(now);
    }

    object.digest_last_checked = Some(now);

    changed
}

pub(crate) fn folder_exports(
    object: &StorageObject,
    rendered: Rendered,
) -> eyre::Result<FolderExports> {
    Ok(FolderExports {
        revision: object.revision,
        metadata: rendered.metadata,
        global: rendered.global,
        local: LocalEnvelope::of(object).to_bytes()?,
    })
}
