use crate::entry::{Codec, DataType, Entry};
use crate::iter::Structured;
use crate::key::{AsKeyParts, FromKeyParts};
use crate::tx::Transaction;
use crate::Store;

/// Typed access to a [`Store`].
#[derive(Clone, Debug)]
pub struct Handle {
    inner: Store,
}

impl Handle {
    pub(crate) const fn new(inner: Store) -> Self {
        Self { inner }
    }

    pub fn has<K: AsKeyParts>(&self, key: &K) -> eyre::Result<bool> {
        self.inner.db.has(K::column(), key.as_key())
    }

    pub fn get<E: Entry>(&self, key: &E) -> eyre::Result<Option<DataType<E>>> {
        let Some(value) = self.inner.db.get(E::column(), key.as_key())? else {
            return Ok(None);
        };

        E::Codec::decode(&value).map(Some)
    }

    pub fn put<E: Entry>(&self, key: &E, value: &DataType<E>) -> eyre::Result<()> {
        let value = E::Codec::encode(value)?;

        self.inner.db.put(E::column(), key.as_key(), &value)
    }

    pub fn delete<K: AsKeyParts>(&self, key: &K) -> eyre::Result<()> {
        self.inner.db.delete(K::column(), key.as_key())
    }

    /// Iterates every entry of the column `E` lives in, in key order.
    pub fn iter<E: Entry + FromKeyParts>(&self) -> eyre::Result<Structured<'_, E, E::Codec>> {
        Ok(self.inner.db.iter(E::column())?.structured())
    }

    pub fn apply(&self, tx: &Transaction) -> eyre::Result<()> {
        self.inner.db.apply(tx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use metashare_primitives::identifier::StorageId;
    use metashare_primitives::status::{CopyStatus, PublicationStatus};

    use crate::db::InMemoryDB;
    use crate::key::ObjectKey;
    use crate::types::StorageObject;
    use crate::Store;

    #[test]
    fn test_typed_roundtrip_and_iteration() {
        let handle = Store::new(Arc::new(InMemoryDB::new())).handle();

        let mut ids = [StorageId::generate(), StorageId::generate()];
        ids.sort();

        for id in ids.iter().rev() {
            let object =
                StorageObject::new(*id, CopyStatus::Master, PublicationStatus::Internal, Utc::now());

            handle.put(&ObjectKey::new(*id), &object).unwrap();
        }

        let stored = handle.get(&ObjectKey::new(ids[0])).unwrap().unwrap();
        assert_eq!(stored.identifier, ids[0]);
        assert_eq!(stored.revision, 1);

        let listed: Vec<_> = handle
            .iter::<ObjectKey>()
            .unwrap()
            .map(|entry| entry.unwrap().0.id())
            .collect();
        assert_eq!(listed, ids);

        handle.delete(&ObjectKey::new(ids[1])).unwrap();
        assert!(!handle.has(&ObjectKey::new(ids[1])).unwrap());
    }
}
