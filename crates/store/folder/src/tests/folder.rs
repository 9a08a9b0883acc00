use camino::Utf8PathBuf;
use metashare_primitives::identifier::StorageId;
use tempfile::TempDir;

use super::*;
use crate::archive::{
    pack, unpack, unpack_with, ArchiveError, ResourceArchive, UnpackLimits, INVENTORY_ENTRY,
    MAX_ENTRIES,
};

fn store(dir: &TempDir) -> FolderStore {
    let path = Utf8PathBuf::try_from(dir.path().to_owned()).unwrap();

    FolderStore::open(&FolderStoreConfig::new(path)).unwrap()
}

fn exports(revision: u32, body: &str) -> FolderExports {
    FolderExports {
        revision,
        metadata: format!("{{\"body\":\"{body}\"}}").into_bytes(),
        global: format!("{{\"revision\":{revision}}}").into_bytes(),
        local: b"{\"copy_status\":\"master\"}".to_vec(),
    }
}

#[test]
fn test_write_creates_stamped_files_and_archive() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let id = StorageId::generate();

    store.write(&id, &exports(3, "a")).unwrap();

    let folder = store.folder(&id);

    assert!(folder.join("metadata-0003.json").is_file());
    assert!(folder.join("storage-global-0003.json").is_file());
    assert!(folder.join(LOCAL_FILE).is_file());
    assert!(folder.join(ARCHIVE_FILE).is_file());

    let archive = store.read_archive(&id).unwrap().unwrap();
    let archive = ResourceArchive::from_bytes(&archive).unwrap();

    assert_eq!(archive.metadata, exports(3, "a").metadata);
    assert_eq!(archive.global, exports(3, "a").global);
}

#[test]
fn test_new_revision_replaces_old_files() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let id = StorageId::generate();

    store.write(&id, &exports(1, "old")).unwrap();
    store.write(&id, &exports(2, "new")).unwrap();

    let folder = store.folder(&id);

    assert!(!folder.join("metadata-0001.json").exists());
    assert!(!folder.join("storage-global-0001.json").exists());

    let contents = store.read(&id).unwrap().unwrap();

    assert_eq!(contents.metadata.unwrap(), exports(2, "new").metadata);
    assert_eq!(contents.global.unwrap(), exports(2, "new").global);
}

#[test]
fn test_read_prefers_newest_revision() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let id = StorageId::generate();

    store.write(&id, &exports(2, "two")).unwrap();

    // Leftover from an interrupted write of revision 1.
    std::fs::write(store.folder(&id).join(metadata_file(1)), b"{}").unwrap();

    let contents = store.read(&id).unwrap().unwrap();
    assert_eq!(contents.metadata.unwrap(), exports(2, "two").metadata);

    assert_eq!(store.prune(&id, 2).unwrap(), 1);
    assert_eq!(store.prune(&id, 2).unwrap(), 0);
}

#[test]
fn test_read_missing_folder() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    assert!(store.read(&StorageId::generate()).unwrap().is_none());
    assert!(store.read_archive(&StorageId::generate()).unwrap().is_none());
}

#[test]
fn test_remove_and_list() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    let mut ids = [StorageId::generate(), StorageId::generate()];
    ids.sort();

    for id in &ids {
        store.write(id, &exports(1, "x")).unwrap();
    }

    std::fs::create_dir(store.root().join("not-an-identifier")).unwrap();

    assert_eq!(store.list().unwrap(), ids);

    assert!(store.remove(&ids[0]).unwrap());
    assert!(!store.remove(&ids[0]).unwrap());

    assert_eq!(store.list().unwrap(), [ids[1]]);
}

#[test]
fn test_staging_is_left_empty() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    store.write(&StorageId::generate(), &exports(1, "x")).unwrap();

    let staged = std::fs::read_dir(store.root().join(".staging")).unwrap().count();
    assert_eq!(staged, 0);
}

#[test]
fn test_pack_is_deterministic() {
    let first = pack([(INVENTORY_ENTRY, &b"[]"[..])]).unwrap();
    let second = pack([(INVENTORY_ENTRY, &b"[]"[..])]).unwrap();

    assert_eq!(first, second);
    assert_eq!(unpack(&first).unwrap()[INVENTORY_ENTRY], b"[]");
}

#[test]
fn test_archive_missing_entry() {
    let bytes = pack([(archive::METADATA_ENTRY, &b"{}"[..])]).unwrap();

    let err = ResourceArchive::from_bytes(&bytes).unwrap_err();

    assert!(matches!(err, ArchiveError::MissingEntry(archive::GLOBAL_ENTRY)));
}

#[test]
fn test_unpack_garbage() {
    assert!(unpack(b"definitely not gzip").is_err());
}

#[test]
fn test_unpack_caps_entry_count() {
    let names: Vec<String> = (0..=MAX_ENTRIES).map(|i| format!("entry-{i}")).collect();
    let bytes = pack(names.iter().map(|name| (name.as_str(), &b"x"[..]))).unwrap();

    assert!(matches!(
        unpack(&bytes).unwrap_err(),
        ArchiveError::TooManyEntries(MAX_ENTRIES)
    ));

    let fits = pack(names[..MAX_ENTRIES].iter().map(|name| (name.as_str(), &b"x"[..]))).unwrap();
    assert_eq!(unpack(&fits).unwrap().len(), MAX_ENTRIES);
}

#[test]
fn test_unpack_caps_sizes() {
    let limits = UnpackLimits {
        max_entries: 4,
        max_entry_size: 8,
        max_total_size: 12,
    };

    let big = pack([("a", &[0_u8; 9][..])]).unwrap();
    assert!(matches!(
        unpack_with(&big, limits).unwrap_err(),
        ArchiveError::TooLarge(name, 8) if name == "a"
    ));

    let sum = pack([("a", &[0_u8; 8][..]), ("b", &[0_u8; 5][..])]).unwrap();
    assert!(matches!(
        unpack_with(&sum, limits).unwrap_err(),
        ArchiveError::ArchiveTooLarge(12)
    ));

    let fits = pack([("a", &[0_u8; 8][..]), ("b", &[0_u8; 4][..])]).unwrap();
    assert_eq!(unpack_with(&fits, limits).unwrap().len(), 2);
}
