#[cfg(test)]
#[path = "tests/identifier.rs"]
mod tests;

use core::fmt;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// Stable, globally unique identifier of a storage object.
///
/// Rendered as 64 lowercase hex characters, which is also the form used in
/// folder names and on the wire.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StorageId([u8; BYTES_LEN]);

impl StorageId {
    /// Creates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; BYTES_LEN]> for StorageId {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<StorageId> for [u8; BYTES_LEN] {
    fn from(id: StorageId) -> Self {
        id.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_hex())
    }
}

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageId").field(&self.to_hex()).finish()
    }
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvalidStorageId {
    #[error("expected {expected} hex characters, got {0}", expected = BYTES_LEN * 2)]
    InvalidLength(usize),
    #[error("identifier must be lowercase hex")]
    InvalidCharacter,
}

impl FromStr for StorageId {
    type Err = InvalidStorageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BYTES_LEN * 2 {
            return Err(InvalidStorageId::InvalidLength(s.len()));
        }

        // Folder names and URLs rely on a single canonical spelling.
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(InvalidStorageId::InvalidCharacter);
        }

        let mut bytes = [0; BYTES_LEN];

        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidStorageId::InvalidCharacter)?;

        Ok(Self(bytes))
    }
}

impl Serialize for StorageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StorageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StorageIdVisitor;

        impl de::Visitor<'_> for StorageIdVisitor {
            type Value = StorageId;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a 64 character hex storage identifier")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(StorageIdVisitor)
    }
}
