use std::collections::{btree_map, BTreeMap};

use crate::db::Column;
use crate::entry::{Codec, DataType, Entry};
use crate::key::AsKeyParts;

/// A batch of writes applied atomically by [`crate::db::Database::apply`].
#[derive(Debug, Default)]
pub struct Transaction {
    cols: BTreeMap<Column, BTreeMap<Vec<u8>, Operation>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Put { value: Vec<u8> },
    Delete,
}

impl Transaction {
    pub fn put<E: Entry>(&mut self, key: &E, value: &DataType<E>) -> eyre::Result<()> {
        let value = E::Codec::encode(value)?;

        let _ignored = self
            .cols
            .entry(E::column())
            .or_default()
            .insert(key.as_key().to_vec(), Operation::Put { value });

        Ok(())
    }

    pub fn delete<K: AsKeyParts>(&mut self, key: &K) {
        let _ignored = self
            .cols
            .entry(K::column())
            .or_default()
            .insert(key.as_key().to_vec(), Operation::Delete);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cols.values().all(BTreeMap::is_empty)
    }

    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            iter: self.cols.iter(),
            cursor: None,
        }
    }
}

#[derive(Eq, Ord, Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct TxEntry<'a> {
    column: Column,
    key: &'a [u8],
}

impl<'a> TxEntry<'a> {
    #[must_use]
    pub const fn key(&self) -> &'a [u8] {
        self.key
    }

    #[must_use]
    pub const fn column(&self) -> Column {
        self.column
    }
}

#[derive(Debug)]
pub struct Iter<'a> {
    iter: btree_map::Iter<'a, Column, BTreeMap<Vec<u8>, Operation>>,
    cursor: Option<IterCursor<'a>>,
}

#[derive(Debug)]
struct IterCursor<'a> {
    column: Column,
    iter: btree_map::Iter<'a, Vec<u8>, Operation>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (TxEntry<'a>, &'a Operation);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                if let Some((key, op)) = cursor.iter.next() {
                    return Some((
                        TxEntry {
                            column: cursor.column,
                            key,
                        },
                        op,
                    ));
                }
            }

            let (column, col_iter) = self.iter.next()?;

            self.cursor = Some(IterCursor {
                column: *column,
                iter: col_iter.iter(),
            });
        }
    }
}
