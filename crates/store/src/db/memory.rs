use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::StoreConfig;
use crate::db::{Column, Database};
use crate::iter::Iter;
use crate::tx::{Operation, Transaction};

type Columns = BTreeMap<Column, BTreeMap<Vec<u8>, Vec<u8>>>;

/// A volatile [`Database`], used by tests and throwaway nodes.
#[derive(Debug, Default)]
pub struct InMemoryDB {
    inner: RwLock<Columns>,
}

impl InMemoryDB {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn db(&self) -> eyre::Result<RwLockReadGuard<'_, Columns>> {
        self.inner
            .read()
            .map_err(|_| eyre::eyre!("failed to acquire read lock on db"))
    }

    fn db_mut(&self) -> eyre::Result<RwLockWriteGuard<'_, Columns>> {
        self.inner
            .write()
            .map_err(|_| eyre::eyre!("failed to acquire write lock on db"))
    }
}

impl Database for InMemoryDB {
    fn open(_config: &StoreConfig) -> eyre::Result<Self> {
        Ok(Self::default())
    }

    fn has(&self, col: Column, key: &[u8]) -> eyre::Result<bool> {
        Ok(self
            .db()?
            .get(&col)
            .is_some_and(|column| column.contains_key(key)))
    }

    fn get(&self, col: Column, key: &[u8]) -> eyre::Result<Option<Vec<u8>>> {
        Ok(self
            .db()?
            .get(&col)
            .and_then(|column| column.get(key))
            .cloned())
    }

    fn put(&self, col: Column, key: &[u8], value: &[u8]) -> eyre::Result<()> {
        let _ignored = self
            .db_mut()?
            .entry(col)
            .or_default()
            .insert(key.to_vec(), value.to_vec());

        Ok(())
    }

    fn delete(&self, col: Column, key: &[u8]) -> eyre::Result<()> {
        if let Some(column) = self.db_mut()?.get_mut(&col) {
            let _ignored = column.remove(key);
        }

        Ok(())
    }

    fn iter(&self, col: Column) -> eyre::Result<Iter<'_>> {
        // Iterates a snapshot so writers are never blocked by a live iterator.
        let entries: Vec<_> = self
            .db()?
            .get(&col)
            .map(|column| {
                column
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Iter::new(entries.into_iter().map(Ok)))
    }

    fn apply(&self, tx: &Transaction) -> eyre::Result<()> {
        let mut db = self.db_mut()?;

        for (entry, op) in tx.iter() {
            let column = db.entry(entry.column()).or_default();

            match op {
                Operation::Put { value } => {
                    let _ignored = column.insert(entry.key().to_vec(), value.clone());
                }
                Operation::Delete => {
                    let _ignored = column.remove(entry.key());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let db = InMemoryDB::new();

        db.put(Column::Object, b"k1", b"v1").unwrap();

        assert!(db.has(Column::Object, b"k1").unwrap());
        assert!(!db.has(Column::Record, b"k1").unwrap());
        assert_eq!(db.get(Column::Object, b"k1").unwrap(), Some(b"v1".to_vec()));

        db.delete(Column::Object, b"k1").unwrap();

        assert_eq!(db.get(Column::Object, b"k1").unwrap(), None);
    }

    #[test]
    fn test_iter_is_ordered() {
        let db = InMemoryDB::new();

        for key in [b"c", b"a", b"b"] {
            db.put(Column::Record, key, key).unwrap();
        }

        let keys: Vec<_> = db
            .iter(Column::Record)
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect();

        assert_eq!(keys, [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_apply_transaction() {
        let db = InMemoryDB::new();

        db.put(Column::Record, &[1; 32], b"old").unwrap();

        let mut tx = Transaction::default();

        tx.delete(&crate::key::RecordKey::new([1; 32].into()));
        tx.put(
            &crate::key::RecordKey::new([2; 32].into()),
            &crate::types::RecordData::from(b"new".to_vec()),
        )
        .unwrap();

        db.apply(&tx).unwrap();

        assert_eq!(db.get(Column::Record, &[1; 32]).unwrap(), None);
        assert_eq!(
            db.get(Column::Record, &[2; 32]).unwrap(),
            Some(b"new".to_vec())
        );
    }
}
