//! RocksDB backend for `metashare-store`.
//!
//! Every [`Column`] maps to a column family of the same name. The `DB` handle
//! is thread-safe, so a single instance is shared behind the `Store` wrapper.


use eyre::{bail, Result as EyreResult, WrapErr};
use metashare_store::config::StoreConfig;
use metashare_store::db::{Column, Database};
use metashare_store::iter::Iter;
use metashare_store::tx::{Operation, Transaction};
use rocksdb::{ColumnFamily, DBRawIteratorWithThreadMode, Options, WriteBatch, DB};
use strum::IntoEnumIterator;

/// Limits file descriptor usage; RocksDB evicts handles past this.
const DEFAULT_MAX_OPEN_FILES: i32 = 256;

#[derive(Debug)]
pub struct RocksDB {
    db: DB,
}

impl RocksDB {
    fn cf_handle(&self, column: Column) -> Option<&ColumnFamily> {
        self.db.cf_handle(column.as_ref())
    }

    fn try_cf_handle(&self, column: Column) -> EyreResult<&ColumnFamily> {
        let Some(cf_handle) = self.cf_handle(column) else {
            bail!("unknown column family: {:?}", column);
        };

        Ok(cf_handle)
    }
}

impl Database for RocksDB {
    fn open(config: &StoreConfig) -> EyreResult<Self> {
        let mut options = Options::default();

        options.create_if_missing(true);
        options.create_missing_column_families(true);
        options.set_max_open_files(DEFAULT_MAX_OPEN_FILES);

        let db = DB::open_cf(&options, &config.path, Column::iter().map(|c| c.as_ref().to_owned()))
            .wrap_err_with(|| format!("failed to open datastore at {}", config.path))?;

        Ok(Self { db })
    }

    fn has(&self, col: Column, key: &[u8]) -> EyreResult<bool> {
        let cf_handle = self.try_cf_handle(col)?;

        let exists =
            self.db.key_may_exist_cf(cf_handle, key) && self.get(col, key)?.is_some();

        Ok(exists)
    }

    fn get(&self, col: Column, key: &[u8]) -> EyreResult<Option<Vec<u8>>> {
        let cf_handle = self.try_cf_handle(col)?;

        Ok(self.db.get_cf(cf_handle, key)?)
    }

    fn put(&self, col: Column, key: &[u8], value: &[u8]) -> EyreResult<()> {
        let cf_handle = self.try_cf_handle(col)?;

        self.db.put_cf(cf_handle, key, value)?;

        Ok(())
    }

    fn delete(&self, col: Column, key: &[u8]) -> EyreResult<()> {
        let cf_handle = self.try_cf_handle(col)?;

        self.db.delete_cf(cf_handle, key)?;

        Ok(())
    }

    fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        let cf_handle = self.try_cf_handle(col)?;

        let mut iter = self.db.raw_iterator_cf(cf_handle);

        iter.seek_to_first();

        Ok(Iter::new(DBIterator { ready: true, iter }))
    }

    fn apply(&self, tx: &Transaction) -> EyreResult<()> {
        let mut batch = WriteBatch::default();

        let mut unknown_cfs = vec![];

        for (entry, op) in tx.iter() {
            let (col, key) = (entry.column(), entry.key());

            let Some(cf) = self.cf_handle(col) else {
                unknown_cfs.push(col);
                continue;
            };

            match op {
                Operation::Put { value } => batch.put_cf(cf, key, value),
                Operation::Delete => batch.delete_cf(cf, key),
            }
        }

        if !unknown_cfs.is_empty() {
            bail!("unknown column families: {:?}", unknown_cfs);
        }

        self.db.write(batch)?;

        Ok(())
    }
}

struct DBIterator<'a> {
    ready: bool,
    iter: DBRawIteratorWithThreadMode<'a, DB>,
}

impl Iterator for DBIterator<'_> {
    type Item = EyreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready {
            self.ready = false;
        } else {
            self.iter.next();
        }

        let Some(key) = self.iter.key() else {
            return self.iter.status().err().map(|err| Err(err.into()));
        };

        let Some(value) = self.iter.value() else {
            return Some(Err(eyre::eyre!("missing value for iterator entry {key:?}")));
        };

        Some(Ok((key.to_vec(), value.to_vec())))
    }
}
