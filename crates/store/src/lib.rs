use std::sync::Arc;

pub mod config;
pub mod db;
pub mod entry;
mod handle;
pub mod iter;
pub mod key;
pub mod tx;
pub mod types;

pub use handle::Handle;

#[derive(Clone)]
pub struct Store {
    db: Arc<dyn db::Database>,
}

impl Store {
    pub fn open<T: db::Database>(config: &config::StoreConfig) -> eyre::Result<Self> {
        let db = T::open(config)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Wraps an already opened database, mostly useful for [`db::InMemoryDB`].
    #[must_use]
    pub fn new(db: Arc<dyn db::Database>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle::new(self.clone())
    }
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
