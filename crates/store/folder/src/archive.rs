//! Gzip-compressed tar archives used for transfer between nodes.

use std::collections::BTreeMap;
use std::io::{self, Read};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;

/// Upper bound on the unpacked size of a single entry.
pub const MAX_ENTRY_SIZE: u64 = 64 << 20;
/// Upper bound on the unpacked size of a whole archive.
pub const MAX_ARCHIVE_SIZE: u64 = 128 << 20;
/// Upper bound on the number of entries in an archive.
pub const MAX_ENTRIES: usize = 16;

/// Entry holding the metadata export.
pub const METADATA_ENTRY: &str = "metadata.json";
/// Entry holding the global envelope export.
pub const GLOBAL_ENTRY: &str = "storage-global.json";
/// Entry holding an inventory document.
pub const INVENTORY_ENTRY: &str = "inventory.json";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    #[error("failed to read archive: {0}")]
    Io(#[from] io::Error),
    #[error("archive entry `{0}` is not a regular file")]
    NotAFile(String),
    #[error("archive entry `{0}` exceeds {1} bytes")]
    TooLarge(String, u64),
    #[error("archive exceeds {0} bytes")]
    ArchiveTooLarge(u64),
    #[error("archive has more than {0} entries")]
    TooManyEntries(usize),
    #[error("archive is missing the `{0}` entry")]
    MissingEntry(&'static str),
}

/// Packs named entries into a `.tar.gz` byte buffer.
///
/// Headers carry a fixed mode and a zero mtime so packing the same entries
/// twice yields the same bytes.
pub fn pack<'a, I>(entries: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for (name, data) in entries {
        let mut header = Header::new_gnu();

        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);

        builder.append_data(&mut header, name, data)?;
    }

    builder.into_inner()?.finish()
}

/// Bounds applied while unpacking an archive from a peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnpackLimits {
    pub max_entries: usize,
    pub max_entry_size: u64,
    pub max_total_size: u64,
}

impl Default for UnpackLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_ENTRIES,
            max_entry_size: MAX_ENTRY_SIZE,
            max_total_size: MAX_ARCHIVE_SIZE,
        }
    }
}

/// Unpacks every regular entry of a `.tar.gz` byte buffer.
pub fn unpack(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    unpack_with(bytes, UnpackLimits::default())
}

pub fn unpack_with(
    bytes: &[u8],
    limits: UnpackLimits,
) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    let mut archive = Archive::new(GzDecoder::new(bytes));

    let mut files = BTreeMap::new();
    let mut total = 0_u64;

    for (index, entry) in archive.entries()?.enumerate() {
        if index >= limits.max_entries {
            return Err(ArchiveError::TooManyEntries(limits.max_entries));
        }

        let entry = entry?;

        let name = entry.path()?.to_string_lossy().into_owned();

        if !entry.header().entry_type().is_file() {
            return Err(ArchiveError::NotAFile(name));
        }

        let size = entry.size();

        if size > limits.max_entry_size {
            return Err(ArchiveError::TooLarge(name, limits.max_entry_size));
        }

        total = total.saturating_add(size);

        if total > limits.max_total_size {
            return Err(ArchiveError::ArchiveTooLarge(limits.max_total_size));
        }

        let mut data = Vec::new();

        let _read = entry.take(size).read_to_end(&mut data)?;

        let _ignored = files.insert(name, data);
    }

    Ok(files)
}

/// The shipped half of a storage folder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceArchive {
    pub metadata: Vec<u8>,
    pub global: Vec<u8>,
}

impl ResourceArchive {
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        pack([
            (METADATA_ENTRY, &*self.metadata),
            (GLOBAL_ENTRY, &*self.global),
        ])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut files = unpack(bytes)?;

        let metadata = files
            .remove(METADATA_ENTRY)
            .ok_or(ArchiveError::MissingEntry(METADATA_ENTRY))?;

        let global = files
            .remove(GLOBAL_ENTRY)
            .ok_or(ArchiveError::MissingEntry(GLOBAL_ENTRY))?;

        Ok(Self { metadata, global })
    }
}
