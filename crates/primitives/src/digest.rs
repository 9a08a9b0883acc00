//! Deterministic content fingerprinting.
//!
//! A digest covers the two byte sequences that travel between nodes: the
//! metadata export of a record and the export of its shared envelope fields.
//! Both are length-prefixed before hashing so that moving bytes from one
//! input to the other always yields a different digest.

#[cfg(test)]
#[path = "tests/digest.rs"]
mod tests;

use core::fmt;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

const BYTES_LEN: usize = 32;

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Digest([u8; BYTES_LEN]);

impl Digest {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; BYTES_LEN]> for Digest {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest").field(&self.to_hex()).finish()
    }
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum DigestError {
    #[error("cannot digest an empty {0}")]
    InvalidInput(DigestInput),
    #[error("digest must be 64 hex characters")]
    InvalidEncoding,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestInput {
    Content,
    Envelope,
}

impl fmt::Display for DigestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Content => "metadata export",
            Self::Envelope => "envelope export",
        })
    }
}

/// Computes the fingerprint of an exported record and its shared envelope.
pub fn compute_digest(content: &[u8], envelope: &[u8]) -> Result<Digest, DigestError> {
    if content.is_empty() {
        return Err(DigestError::InvalidInput(DigestInput::Content));
    }

    if envelope.is_empty() {
        return Err(DigestError::InvalidInput(DigestInput::Envelope));
    }

    let mut hasher = Sha256::new();

    for part in [content, envelope] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }

    Ok(Digest(hasher.finalize().into()))
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES_LEN];

        hex::decode_to_slice(s.to_ascii_lowercase(), &mut bytes)
            .map_err(|_| DigestError::InvalidEncoding)?;

        Ok(Self(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DigestVisitor;

        impl de::Visitor<'_> for DigestVisitor {
            type Value = Digest;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a hex encoded digest")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}
