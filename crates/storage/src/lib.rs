//! Storage objects: the envelope around every catalog record.
//!
//! [`StorageManager`] is the only writer of envelopes and of the storage
//! folder tree. Every mutation commits the envelope (and the record, if it
//! changed) in one transaction first and then rewrites the folder, so a
//! crash in between is repaired by [`StorageManager::repair_storage_folder`].

use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use eyre::eyre;
use metashare_folderstore::archive::ResourceArchive;
use metashare_folderstore::FolderStore;
use metashare_primitives::digest::Digest;
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::{CopyStatus, PublicationStatus};
use metashare_store::key::ObjectKey;
use metashare_store::tx::Transaction;
use metashare_store::types::StorageObject;
use metashare_store::Store;
use tracing::{debug, error, info, warn};

use crate::config::LocalNode;
use crate::envelope::{GlobalEnvelope, LocalEnvelope};
use crate::error::StorageError;
use crate::index::{IndexEvent, IndexNotifier, NoopIndex};
use crate::lock::IdentifierLocks;
use crate::materialize::{folder_exports, render, stamp_digest, Rendered};
use crate::record::{Record, RecordRepository, StoreRecords};

pub mod config;
pub mod envelope;
pub mod error;
pub mod index;
pub mod lock;
mod materialize;
pub mod record;

/// Everything learned about an object from a peer or from a folder.
#[derive(Clone, Debug)]
pub struct RemoteUpdate {
    pub envelope: GlobalEnvelope,
    /// The metadata export as shipped.
    pub content: Vec<u8>,
    /// The digest advertised by the source, if any.
    pub digest: Option<Digest>,
    pub copy_status: CopyStatus,
    pub source_node: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    Created,
    Updated,
}

/// Local-only state carried over by a restore.
#[derive(Debug)]
struct Carried {
    deleted: bool,
    digest_checksum: Option<Digest>,
    digest_modified: Option<DateTime<Utc>>,
    digest_last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<StorageId>,
    pub failed: Vec<(StorageId, StorageError)>,
}

#[derive(Debug, Default)]
pub struct RepairReport {
    /// Objects whose folder was rewritten.
    pub rematerialized: Vec<StorageId>,
    /// Folders that were deleted.
    pub removed: Vec<StorageId>,
}

#[derive(Clone)]
pub struct StorageManager {
    store: Store,
    folders: FolderStore,
    records: Arc<dyn RecordRepository>,
    index: Arc<dyn IndexNotifier>,
    locks: Arc<IdentifierLocks>,
    node: Arc<LocalNode>,
}

impl Debug for StorageManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageManager")
            .field("store", &self.store)
            .field("folders", &self.folders)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl StorageManager {
    #[must_use]
    pub fn new(store: Store, folders: FolderStore, node: LocalNode) -> Self {
        Self {
            records: Arc::new(StoreRecords::new(store.clone())),
            store,
            folders,
            index: Arc::new(NoopIndex),
            locks: Arc::default(),
            node: Arc::new(node),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn IndexNotifier>) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_records(mut self, records: Arc<dyn RecordRepository>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub const fn folders(&self) -> &FolderStore {
        &self.folders
    }

    #[must_use]
    pub fn node(&self) -> &LocalNode {
        &self.node
    }

    pub fn get(&self, id: &StorageId) -> Result<Option<StorageObject>, StorageError> {
        Ok(self.store.handle().get(&ObjectKey::new(*id))?)
    }

    fn load(&self, id: &StorageId) -> Result<StorageObject, StorageError> {
        self.get(id)?.ok_or(StorageError::UnknownObject(*id))
    }

    /// All envelopes, in identifier order.
    pub fn list(&self) -> Result<Vec<StorageObject>, StorageError> {
        let handle = self.store.handle();

        let mut objects = Vec::new();

        for entry in handle.iter::<ObjectKey>()? {
            let (_key, object) = entry?;
            objects.push(object);
        }

        Ok(objects)
    }

    pub fn record(&self, id: &StorageId) -> Result<Option<Record>, StorageError> {
        Ok(self.records.load(id)?)
    }

    fn load_record(&self, id: &StorageId) -> Result<Record, StorageError> {
        self.records
            .load(id)?
            .ok_or_else(|| StorageError::Other(eyre!("record of {id} is missing")))
    }

    /// Identifiers and digests of every object offered to peers.
    pub fn inventory(&self) -> Result<Vec<(StorageId, Digest)>, StorageError> {
        let mut inventory = Vec::new();

        for object in self.list()? {
            if !object.is_exported() {
                continue;
            }

            match object.digest_checksum {
                Some(digest) => inventory.push((object.identifier, digest)),
                None => warn!(id = %object.identifier, "Exported object has no digest"),
            }
        }

        Ok(inventory)
    }

    fn commit(&self, object: &StorageObject, record: Option<&Record>) -> Result<(), StorageError> {
        let mut tx = Transaction::default();

        tx.put(&ObjectKey::new(object.identifier), object)?;

        if let Some(record) = record {
            self.records.save(&mut tx, &object.identifier, record)?;
        }

        self.store.handle().apply(&tx)?;

        Ok(())
    }

    /// Re-digests a materialized object, commits it and brings its folder in
    /// line with the committed state.
    fn persist(
        &self,
        mut object: StorageObject,
        record: &Record,
        record_changed: bool,
        now: DateTime<Utc>,
    ) -> Result<StorageObject, StorageError> {
        let rendered = if object.publication_status.is_materialized() {
            let rendered = render(&object, record)?;

            let _changed = stamp_digest(&mut object, rendered.digest, now);

            Some(rendered)
        } else {
            None
        };

        self.commit(&object, record_changed.then_some(record))?;

        self.write_folder(&object, rendered)?;

        Ok(object)
    }

    fn write_folder(
        &self,
        object: &StorageObject,
        rendered: Option<Rendered>,
    ) -> Result<(), StorageError> {
        let id = &object.identifier;

        match rendered {
            Some(rendered) => self.folders.write(id, &folder_exports(object, rendered)?)?,
            None => {
                if self.folders.remove(id)? {
                    debug!(%id, "Removed storage folder of unmaterialized object");
                }
            }
        }

        Ok(())
    }

    /// Registers a new locally authored record.
    pub fn create(&self, record: &Record) -> Result<StorageObject, StorageError> {
        let now = Utc::now();

        let mut object = StorageObject::new(
            StorageId::generate(),
            CopyStatus::Master,
            PublicationStatus::Internal,
            now,
        );

        object.source_url.clone_from(&self.node.url);

        let _guard = self.locks.lock(object.identifier);

        let object = self.persist(object, record, true, now)?;

        info!(id = %object.identifier, "Created storage object");

        self.index
            .notify(IndexEvent::ContentChanged(object.identifier));

        Ok(object)
    }

    /// Moves an object forward in its lifecycle and materializes it.
    pub fn transition_publication_status(
        &self,
        id: &StorageId,
        status: PublicationStatus,
    ) -> Result<StorageObject, StorageError> {
        let _guard = self.locks.lock(*id);

        let mut object = self.load(id)?;

        if !object.copy_status.is_master() {
            return Err(StorageError::NotMaster(*id));
        }

        if status <= object.publication_status {
            return Err(StorageError::InvalidTransition {
                id: *id,
                from: object.publication_status,
                to: status,
            });
        }

        self.change_status(&mut object, status)
    }

    /// Takes a published object back to ingested.
    pub fn unpublish(&self, id: &StorageId) -> Result<StorageObject, StorageError> {
        let _guard = self.locks.lock(*id);

        let mut object = self.load(id)?;

        if !object.copy_status.is_master() {
            return Err(StorageError::NotMaster(*id));
        }

        if object.publication_status != PublicationStatus::Published {
            return Err(StorageError::InvalidTransition {
                id: *id,
                from: object.publication_status,
                to: PublicationStatus::Ingested,
            });
        }

        self.change_status(&mut object, PublicationStatus::Ingested)
    }

    fn change_status(
        &self,
        object: &mut StorageObject,
        status: PublicationStatus,
    ) -> Result<StorageObject, StorageError> {
        let id = object.identifier;
        let record = self.load_record(&id)?;
        let now = Utc::now();

        let from = object.publication_status;

        object.publication_status = status;
        object.revision += 1;
        object.modified = now;

        let object = self.persist(object.clone(), &record, false, now)?;

        info!(%id, %from, to = %status, "Publication status changed");

        self.index.notify(if status == PublicationStatus::Published {
            IndexEvent::Published(id)
        } else {
            IndexEvent::StatusChanged { id, status }
        });

        Ok(object)
    }

    /// Replaces the record of a local master copy.
    pub fn update_content(
        &self,
        id: &StorageId,
        record: &Record,
    ) -> Result<StorageObject, StorageError> {
        let _guard = self.locks.lock(*id);

        let mut object = self.load(id)?;

        if !object.copy_status.is_master() {
            return Err(StorageError::NotMaster(*id));
        }

        let now = Utc::now();

        object.revision += 1;
        object.modified = now;

        let object = self.persist(object, record, true, now)?;

        debug!(%id, revision = object.revision, "Updated record content");

        self.index.notify(IndexEvent::ContentChanged(*id));

        Ok(object)
    }

    /// Applies an object learned from a peer.
    ///
    /// Local master copies are never overwritten, and a peer can never hand
    /// out master authority.
    pub fn apply_remote_update(
        &self,
        id: &StorageId,
        update: RemoteUpdate,
    ) -> Result<UpdateOutcome, StorageError> {
        if update.copy_status.is_master() {
            warn!(%id, source = ?update.source_node, "Rejected inbound update claiming master authority");

            return Err(StorageError::AuthorityConflict(*id));
        }

        self.apply_update(id, update, None)
    }

    fn apply_update(
        &self,
        id: &StorageId,
        update: RemoteUpdate,
        carried: Option<Carried>,
    ) -> Result<UpdateOutcome, StorageError> {
        let envelope = update.envelope;

        if envelope.identifier != *id {
            return Err(StorageError::MalformedContent(format!(
                "envelope belongs to {}, expected {id}",
                envelope.identifier
            )));
        }

        let record = Record::from_slice(&update.content)?;

        // A trusted restore may reinstate a master copy over itself.
        let trusted_master = carried.is_some() && update.copy_status.is_master();

        let _guard = self.locks.lock(*id);

        let existing = self.get(id)?;

        let (mut object, outcome) = match existing {
            None => {
                let object = StorageObject::new(
                    *id,
                    update.copy_status,
                    envelope.publication_status,
                    envelope.created,
                );

                (object, UpdateOutcome::Created)
            }
            Some(object) if object.copy_status.is_master() && !trusted_master => {
                warn!(%id, source = ?update.source_node, "Rejected update of a local master copy");

                return Err(StorageError::AuthorityConflict(*id));
            }
            Some(object) => {
                if envelope.revision < object.revision {
                    warn!(
                        %id,
                        local = object.revision,
                        incoming = envelope.revision,
                        "Incoming revision is older than the local one, keeping the local revision"
                    );
                }

                if object.copy_status != update.copy_status || object.source_node != update.source_node
                {
                    debug!(
                        %id,
                        from = ?object.source_node,
                        to = ?update.source_node,
                        copy_status = %update.copy_status,
                        "Reassigning object source"
                    );
                }

                (object, UpdateOutcome::Updated)
            }
        };

        let was_published = object.publication_status == PublicationStatus::Published
            && outcome == UpdateOutcome::Updated;

        object.revision = object.revision.max(envelope.revision);
        object.created = envelope.created;
        object.modified = envelope.modified;
        object.publication_status = envelope.publication_status;
        object.source_url = envelope.source_url;
        object.copy_status = update.copy_status;
        object.source_node = update.source_node;

        if let Some(carried) = carried {
            object.deleted = carried.deleted;
            object.digest_checksum = carried.digest_checksum;
            object.digest_modified = carried.digest_modified;
            object.digest_last_checked = carried.digest_last_checked;
        }

        let object = self.persist(object, &record, true, Utc::now())?;

        if let (Some(advertised), Some(local)) = (update.digest, object.digest_checksum) {
            if advertised != local {
                warn!(%id, %advertised, %local, "Local digest diverges from the source's");
            }
        }

        debug!(%id, ?outcome, copy_status = %object.copy_status, "Applied update");

        self.index.notify(IndexEvent::ContentChanged(*id));

        if object.publication_status == PublicationStatus::Published && !was_published {
            self.index.notify(IndexEvent::Published(*id));
        }

        Ok(outcome)
    }

    pub fn mark_deleted(&self, id: &StorageId) -> Result<StorageObject, StorageError> {
        self.set_deleted(id, true)
    }

    pub fn unmark_deleted(&self, id: &StorageId) -> Result<StorageObject, StorageError> {
        self.set_deleted(id, false)
    }

    fn set_deleted(&self, id: &StorageId, deleted: bool) -> Result<StorageObject, StorageError> {
        let _guard = self.locks.lock(*id);

        let mut object = self.load(id)?;

        if object.deleted == deleted {
            return Ok(object);
        }

        object.deleted = deleted;

        self.commit(&object, None)?;

        if object.publication_status.is_materialized() {
            self.folders
                .write_local(id, &LocalEnvelope::of(&object).to_bytes()?)?;
        }

        debug!(%id, deleted, "Changed deletion flag");

        self.index.notify(if deleted {
            IndexEvent::Deleted(*id)
        } else {
            IndexEvent::Undeleted(*id)
        });

        Ok(object)
    }

    /// Irreversibly removes the envelope, the record and the folder.
    ///
    /// Returns whether an envelope existed. Purging an unknown identifier
    /// still removes a stray folder.
    pub fn purge(&self, id: &StorageId) -> Result<bool, StorageError> {
        let _guard = self.locks.lock(*id);

        let existed = self.store.handle().has(&ObjectKey::new(*id))?;

        let mut tx = Transaction::default();

        tx.delete(&ObjectKey::new(*id));
        self.records.remove(&mut tx, id);

        self.store.handle().apply(&tx)?;

        let _removed = self.folders.remove(id)?;

        if existed {
            info!(%id, "Purged storage object");

            self.index.notify(IndexEvent::Purged(*id));
        }

        Ok(existed)
    }

    /// Purges every object sourced from `node`.
    pub fn remove_node(&self, node: &str) -> Result<Vec<StorageId>, StorageError> {
        let mut purged = Vec::new();

        for object in self.list()? {
            if object.source_node.as_deref() != Some(node) {
                continue;
            }

            if self.purge(&object.identifier)? {
                purged.push(object.identifier);
            }
        }

        info!(node, count = purged.len(), "Removed objects of node");

        Ok(purged)
    }

    /// The transfer archive of an exported object.
    pub fn export_archive(&self, id: &StorageId) -> Result<Vec<u8>, StorageError> {
        let object = self.load(id)?;

        if !object.is_exported() {
            return Err(StorageError::NotAvailable(*id));
        }

        if let Some(bytes) = self.folders.read_archive(id)? {
            return Ok(bytes);
        }

        warn!(%id, "Transfer archive missing from storage folder, packing from the datastore");

        let rendered = render(&object, &self.load_record(id)?)?;

        let archive = ResourceArchive {
            metadata: rendered.metadata,
            global: rendered.global,
        };

        Ok(archive.to_bytes().map_err(eyre::Report::from)?)
    }

    /// Recomputes the digest of a materialized object. Returns whether the
    /// stored value was stale.
    pub fn refresh_digest(&self, id: &StorageId, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let _guard = self.locks.lock(*id);

        let mut object = self.load(id)?;

        if !object.publication_status.is_materialized() {
            return Err(StorageError::NotAvailable(*id));
        }

        let rendered = render(&object, &self.load_record(id)?)?;

        let changed = stamp_digest(&mut object, rendered.digest, now);

        self.commit(&object, None)?;

        if changed {
            warn!(%id, digest = %rendered.digest, "Stored digest was stale");

            self.folders
                .write(id, &folder_exports(&object, rendered)?)?;
        } else {
            self.folders
                .write_local(id, &LocalEnvelope::of(&object).to_bytes()?)?;
        }

        Ok(changed)
    }

    /// Rebuilds an object from its storage folder.
    ///
    /// The copy status comes from the local envelope when present, otherwise
    /// `default_copy_status` applies.
    pub fn restore_from_folder(
        &self,
        id: &StorageId,
        default_copy_status: CopyStatus,
    ) -> Result<UpdateOutcome, StorageError> {
        let contents = self
            .folders
            .read(id)?
            .ok_or(StorageError::MissingEnvelope(*id))?;

        let metadata = contents.metadata.ok_or_else(|| {
            StorageError::MalformedContent(format!("storage folder of {id} has no metadata export"))
        })?;

        let global = contents.global.ok_or(StorageError::MissingEnvelope(*id))?;
        let envelope = GlobalEnvelope::from_slice(&global)?;

        let local = match contents.local.as_deref().map(LocalEnvelope::from_slice) {
            Some(Ok(local)) => Some(local),
            Some(Err(err)) => {
                warn!(%id, %err, "Ignoring unreadable local envelope");
                None
            }
            None => None,
        };

        let (copy_status, source_node, carried) = match local {
            Some(local) => (
                local.copy_status,
                local.source_node,
                Carried {
                    deleted: local.deleted,
                    digest_checksum: local.digest_checksum,
                    digest_modified: local.digest_modified,
                    digest_last_checked: local.digest_last_checked,
                },
            ),
            None => (
                default_copy_status,
                None,
                Carried {
                    deleted: false,
                    digest_checksum: None,
                    digest_modified: None,
                    digest_last_checked: None,
                },
            ),
        };

        let update = RemoteUpdate {
            envelope,
            content: metadata,
            digest: None,
            copy_status,
            source_node,
        };

        self.apply_update(id, update, Some(carried))
    }

    /// Restores every non-empty folder under the storage root.
    pub fn restore_all(&self) -> Result<RestoreReport, StorageError> {
        let mut report = RestoreReport::default();

        for id in self.folders.list()? {
            if self
                .folders
                .read(&id)?
                .map_or(true, |contents| contents.is_empty())
            {
                debug!(%id, "Skipping empty storage folder");
                continue;
            }

            match self.restore_from_folder(&id, CopyStatus::Master) {
                Ok(outcome) => {
                    debug!(%id, ?outcome, "Restored storage object");
                    report.restored.push(id);
                }
                Err(err) => {
                    error!(%id, %err, "Failed to restore storage object");
                    report.failed.push((id, err));
                }
            }
        }

        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "Restore finished"
        );

        Ok(report)
    }

    /// Brings the folder tree in line with the datastore.
    pub fn repair_storage_folder(&self) -> Result<RepairReport, StorageError> {
        let mut report = RepairReport::default();

        for id in self.list()?.into_iter().map(|object| object.identifier) {
            let _guard = self.locks.lock(id);

            let Some(object) = self.get(&id)? else {
                continue;
            };

            if object.publication_status.is_materialized() {
                let record = match self.load_record(&id) {
                    Ok(record) => record,
                    Err(err) => {
                        error!(%id, %err, "Cannot rematerialize object");
                        continue;
                    }
                };

                let _object = self.persist(object, &record, false, Utc::now())?;

                report.rematerialized.push(id);
            } else if self.folders.remove(&id)? {
                report.removed.push(id);
            }
        }

        for id in self.folders.list()? {
            if self.get(&id)?.is_none() {
                let _guard = self.locks.lock(id);

                if self.folders.remove(&id)? {
                    warn!(%id, "Removed storage folder without an object");
                    report.removed.push(id);
                }
            }
        }

        info!(
            rematerialized = report.rematerialized.len(),
            removed = report.removed.len(),
            "Storage folder repaired"
        );

        Ok(report)
    }

    /// Drops envelopes whose record is gone.
    pub fn repair_storage_objects(&self) -> Result<Vec<StorageId>, StorageError> {
        let mut purged = Vec::new();

        for object in self.list()? {
            let id = object.identifier;

            if self.records.load(&id)?.is_none() && self.purge(&id)? {
                warn!(%id, "Purged storage object without a record");
                purged.push(id);
            }
        }

        Ok(purged)
    }
}
