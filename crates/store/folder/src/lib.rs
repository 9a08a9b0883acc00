//! On-disk storage folders.
//!
//! Each exported object owns one folder named after its identifier:
//!
//! ```text
//! <root>/<identifier>/metadata-0003.json
//! <root>/<identifier>/storage-global-0003.json
//! <root>/<identifier>/storage-local.json
//! <root>/<identifier>/resource.tar.gz
//! ```
//!
//! Files are written into `<root>/.staging/` first and renamed into place, so
//! a reader sees either the previous or the next version of a file, never a
//! partial one.

#[cfg(test)]
#[path = "tests/folder.rs"]
mod tests;

pub mod archive;
pub mod config;

use std::fs;
use std::io::{ErrorKind, Write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use metashare_primitives::identifier::StorageId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::archive::ResourceArchive;
use crate::config::FolderStoreConfig;

const STAGING_DIR: &str = ".staging";
const METADATA_PREFIX: &str = "metadata-";
const GLOBAL_PREFIX: &str = "storage-global-";
const STAMPED_SUFFIX: &str = ".json";

pub const LOCAL_FILE: &str = "storage-local.json";
pub const ARCHIVE_FILE: &str = "resource.tar.gz";

#[must_use]
pub fn metadata_file(revision: u32) -> String {
    format!("{METADATA_PREFIX}{revision:04}{STAMPED_SUFFIX}")
}

#[must_use]
pub fn global_file(revision: u32) -> String {
    format!("{GLOBAL_PREFIX}{revision:04}{STAMPED_SUFFIX}")
}

fn parse_stamp(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_suffix(STAMPED_SUFFIX)?
        .parse()
        .ok()
}

/// Everything written for one revision of an object.
#[derive(Clone, Debug)]
pub struct FolderExports {
    pub revision: u32,
    pub metadata: Vec<u8>,
    pub global: Vec<u8>,
    pub local: Vec<u8>,
}

/// What was found in a folder. Missing pieces are `None`.
#[derive(Clone, Debug, Default)]
pub struct FolderContents {
    pub metadata: Option<Vec<u8>>,
    pub global: Option<Vec<u8>>,
    pub local: Option<Vec<u8>>,
}

impl FolderContents {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.global.is_none() && self.local.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct FolderStore {
    root: Utf8PathBuf,
}

impl FolderStore {
    pub fn open(config: &FolderStoreConfig) -> EyreResult<Self> {
        let root = config.path.clone();

        fs::create_dir_all(root.join(STAGING_DIR))
            .wrap_err_with(|| format!("failed to create storage root at {root}"))?;

        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn folder(&self, id: &StorageId) -> Utf8PathBuf {
        self.root.join(id.to_hex())
    }

    #[must_use]
    pub fn exists(&self, id: &StorageId) -> bool {
        self.folder(id).is_dir()
    }

    /// Atomically replaces `path` with `data`.
    fn write_file(&self, path: &Utf8Path, data: &[u8]) -> EyreResult<()> {
        let mut staged = NamedTempFile::new_in(self.root.join(STAGING_DIR))
            .wrap_err("failed to create staging file")?;

        staged.write_all(data)?;
        staged.as_file().sync_all()?;

        let _file = staged
            .persist(path)
            .wrap_err_with(|| format!("failed to move staged file into {path}"))?;

        Ok(())
    }

    /// Writes all exports of a revision and drops files of older revisions.
    ///
    /// Idempotent: writing the same exports twice leaves the same folder.
    pub fn write(&self, id: &StorageId, exports: &FolderExports) -> EyreResult<()> {
        let folder = self.folder(id);

        fs::create_dir_all(&folder)
            .wrap_err_with(|| format!("failed to create storage folder {folder}"))?;

        self.write_file(&folder.join(metadata_file(exports.revision)), &exports.metadata)?;
        self.write_file(&folder.join(global_file(exports.revision)), &exports.global)?;
        self.write_file(&folder.join(LOCAL_FILE), &exports.local)?;

        let archive = ResourceArchive {
            metadata: exports.metadata.clone(),
            global: exports.global.clone(),
        }
        .to_bytes()
        .wrap_err("failed to pack resource archive")?;

        self.write_file(&folder.join(ARCHIVE_FILE), &archive)?;

        let _pruned = self.prune(id, exports.revision)?;

        debug!(%id, revision = exports.revision, "Storage folder written");

        Ok(())
    }

    /// Rewrites only the local envelope of an existing folder.
    pub fn write_local(&self, id: &StorageId, local: &[u8]) -> EyreResult<()> {
        let folder = self.folder(id);

        fs::create_dir_all(&folder)
            .wrap_err_with(|| format!("failed to create storage folder {folder}"))?;

        self.write_file(&folder.join(LOCAL_FILE), local)
    }

    /// Removes revision-stamped files not belonging to `revision`, and any
    /// file this store does not know about. Returns the number of removed files.
    pub fn prune(&self, id: &StorageId, revision: u32) -> EyreResult<usize> {
        let folder = self.folder(id);

        let keep = [
            metadata_file(revision),
            global_file(revision),
            LOCAL_FILE.to_owned(),
            ARCHIVE_FILE.to_owned(),
        ];

        let mut removed = 0;

        for entry in folder.read_dir_utf8()? {
            let entry = entry?;

            if keep.iter().any(|name| name == entry.file_name()) {
                continue;
            }

            let path = entry.path();

            if path.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }

            debug!(%id, file = %entry.file_name(), "Removed superfluous storage file");

            removed += 1;
        }

        Ok(removed)
    }

    /// Reads the newest revision present in the folder, `None` if the folder
    /// does not exist.
    pub fn read(&self, id: &StorageId) -> EyreResult<Option<FolderContents>> {
        let folder = self.folder(id);

        let entries = match folder.read_dir_utf8() {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).wrap_err_with(|| format!("failed to read {folder}")),
        };

        let mut metadata: Option<(u32, Utf8PathBuf)> = None;
        let mut global: Option<(u32, Utf8PathBuf)> = None;
        let mut local = None;

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();

            if name == LOCAL_FILE {
                local = Some(entry.path().to_owned());
            } else if let Some(rev) = parse_stamp(name, METADATA_PREFIX) {
                if metadata.as_ref().map_or(true, |(r, _)| rev > *r) {
                    metadata = Some((rev, entry.path().to_owned()));
                }
            } else if let Some(rev) = parse_stamp(name, GLOBAL_PREFIX) {
                if global.as_ref().map_or(true, |(r, _)| rev > *r) {
                    global = Some((rev, entry.path().to_owned()));
                }
            }
        }

        if let (Some((m, _)), Some((g, _))) = (&metadata, &global) {
            if m != g {
                warn!(%id, metadata = m, global = g, "Storage folder revisions disagree");
            }
        }

        let read = |path: Option<Utf8PathBuf>| -> EyreResult<Option<Vec<u8>>> {
            path.map(|path| fs::read(&path).wrap_err_with(|| format!("failed to read {path}")))
                .transpose()
        };

        Ok(Some(FolderContents {
            metadata: read(metadata.map(|(_, path)| path))?,
            global: read(global.map(|(_, path)| path))?,
            local: read(local)?,
        }))
    }

    /// The packed transfer archive, `None` if it was never written.
    pub fn read_archive(&self, id: &StorageId) -> EyreResult<Option<Vec<u8>>> {
        let path = self.folder(id).join(ARCHIVE_FILE);

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to read {path}")),
        }
    }

    /// Deletes the folder. Returns whether anything was removed.
    pub fn remove(&self, id: &StorageId) -> EyreResult<bool> {
        let folder = self.folder(id);

        match fs::remove_dir_all(&folder) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to remove {folder}")),
        }
    }

    /// Identifiers of all folders under the root, in identifier order.
    ///
    /// Entries whose name is not an identifier are skipped.
    pub fn list(&self) -> EyreResult<Vec<StorageId>> {
        let mut ids = Vec::new();

        for entry in self.root.read_dir_utf8()? {
            let entry = entry?;

            if !entry.file_type()?.is_dir() || entry.file_name() == STAGING_DIR {
                continue;
            }

            match entry.file_name().parse() {
                Ok(id) => ids.push(id),
                Err(err) => {
                    debug!(name = %entry.file_name(), %err, "Skipping foreign storage entry");
                }
            }
        }

        ids.sort();

        Ok(ids)
    }
}
