use strum::{AsRefStr, EnumIter};

use crate::config::StoreConfig;
use crate::iter::Iter;
use crate::tx::Transaction;

mod memory;

pub use memory::InMemoryDB;

#[derive(Eq, Ord, Copy, Clone, Debug, PartialEq, PartialOrd, EnumIter, AsRefStr)]
pub enum Column {
    /// Storage object envelopes, keyed by identifier.
    Object,
    /// Records owned by storage objects, keyed by identifier.
    Record,
}

pub trait Database: Send + Sync + 'static {
    fn open(config: &StoreConfig) -> eyre::Result<Self>
    where
        Self: Sized;

    fn has(&self, col: Column, key: &[u8]) -> eyre::Result<bool>;
    fn get(&self, col: Column, key: &[u8]) -> eyre::Result<Option<Vec<u8>>>;
    fn put(&self, col: Column, key: &[u8], value: &[u8]) -> eyre::Result<()>;
    fn delete(&self, col: Column, key: &[u8]) -> eyre::Result<()>;
    fn iter(&self, col: Column) -> eyre::Result<Iter<'_>>;

    /// Applies every operation of the transaction, or none of them.
    fn apply(&self, tx: &Transaction) -> eyre::Result<()>;
}
