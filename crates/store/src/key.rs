use core::fmt::{self, Debug, Formatter};

use metashare_primitives::identifier::StorageId;

use crate::db::Column;

/// A typed key that knows which column it lives in.
pub trait AsKeyParts: Copy {
    fn column() -> Column;
    fn as_key(&self) -> &[u8];
}

pub trait FromKeyParts: AsKeyParts + Sized {
    fn try_from_parts(bytes: &[u8]) -> eyre::Result<Self>;
}

fn storage_id_from(bytes: &[u8]) -> eyre::Result<StorageId> {
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| eyre::eyre!("expected a 32 byte key, found {} bytes", bytes.len()))?;

    Ok(StorageId::from(bytes))
}

macro_rules! storage_id_key {
    ($(#[$meta:meta])* $name:ident => $column:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name(StorageId);

        impl $name {
            #[must_use]
            pub const fn new(id: StorageId) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn id(&self) -> StorageId {
                self.0
            }
        }

        impl AsKeyParts for $name {
            fn column() -> Column {
                Column::$column
            }

            fn as_key(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl FromKeyParts for $name {
            fn try_from_parts(bytes: &[u8]) -> eyre::Result<Self> {
                storage_id_from(bytes).map(Self)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

storage_id_key!(
    /// Key of a storage object envelope.
    ObjectKey => Object
);

storage_id_key!(
    /// Key of the record owned by a storage object.
    RecordKey => Record
);
