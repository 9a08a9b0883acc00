//! Language-resource records and their persistence.

use std::collections::BTreeMap;

use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::CopyStatus;
use metashare_store::key::RecordKey;
use metashare_store::tx::Transaction;
use metashare_store::types::RecordData;
use metashare_store::Store;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// Top-level fields holding reusable sub-entities.
pub const EMBEDDED_FIELDS: [&str; 2] = ["contactPerson", "organization"];

/// A language-resource description, always a JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StorageError> {
        match serde_json::from_slice(bytes).map_err(StorageError::malformed)? {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StorageError::MalformedContent(format!(
                "expected a JSON object, found {}",
                kind(&other)
            ))),
        }
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The metadata export: compact JSON with object keys sorted at every
    /// level, identical on every node for equal records.
    pub fn export(&self) -> eyre::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&Canonical(&Value::Object(self.0.clone())))?)
    }

    /// Sub-entities embedded in the record, carrying the owner's copy status.
    #[must_use]
    pub fn embedded_entities(&self, owner: CopyStatus) -> Vec<EmbeddedEntity<'_>> {
        let mut entities = Vec::new();

        for field in EMBEDDED_FIELDS {
            let values = match self.0.get(field) {
                Some(Value::Array(values)) => values.iter().collect(),
                Some(value @ Value::Object(_)) => vec![value],
                _ => continue,
            };

            entities.extend(values.into_iter().map(|value| EmbeddedEntity {
                kind: field,
                value,
                copy_status: owner,
            }));
        }

        entities
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A contact person, organization or similar entity inside a record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmbeddedEntity<'a> {
    pub kind: &'static str,
    pub value: &'a Value,
    pub copy_status: CopyStatus,
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(fields) => {
                let sorted: BTreeMap<_, _> =
                    fields.iter().map(|(k, v)| (k, Canonical(v))).collect();

                sorted.serialize(serializer)
            }
            Value::Array(values) => serializer.collect_seq(values.iter().map(Canonical)),
            other => other.serialize(serializer),
        }
    }
}

/// Persistence of records owned by storage objects.
///
/// Writes are staged into the caller's transaction so that a record and its
/// envelope are committed together.
pub trait RecordRepository: Send + Sync {
    fn load(&self, id: &StorageId) -> eyre::Result<Option<Record>>;

    fn save(&self, tx: &mut Transaction, id: &StorageId, record: &Record) -> eyre::Result<()>;

    fn remove(&self, tx: &mut Transaction, id: &StorageId);
}

/// Keeps records in the key-value store next to the envelopes.
#[derive(Clone, Debug)]
pub struct StoreRecords {
    store: Store,
}

impl StoreRecords {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl RecordRepository for StoreRecords {
    fn load(&self, id: &StorageId) -> eyre::Result<Option<Record>> {
        let Some(data) = self.store.handle().get(&RecordKey::new(*id))? else {
            return Ok(None);
        };

        Ok(Some(Record::from_slice(data.as_ref())?))
    }

    fn save(&self, tx: &mut Transaction, id: &StorageId, record: &Record) -> eyre::Result<()> {
        tx.put(&RecordKey::new(*id), &RecordData::from(record.export()?))
    }

    fn remove(&self, tx: &mut Transaction, id: &StorageId) {
        tx.delete(&RecordKey::new(*id));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        let Value::Object(fields) = value else {
            panic!("test records are objects");
        };

        Record::new(fields)
    }

    #[test]
    fn test_export_is_canonical() {
        let a = Record::from_slice(br#"{"b": 1, "a": {"z": [ {"y": 1, "x": 2} ], "c": null}}"#)
            .unwrap();
        let b = Record::from_slice(br#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#).unwrap();

        assert_eq!(a.export().unwrap(), b.export().unwrap());
        assert_eq!(
            a.export().unwrap(),
            br#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_rejects_non_objects() {
        for input in [&b"[1,2]"[..], b"\"text\"", b"{not json"] {
            let err = Record::from_slice(input).unwrap_err();

            assert!(matches!(err, StorageError::MalformedContent(_)), "{err}");
        }
    }

    #[test]
    fn test_embedded_entities_follow_owner() {
        let record = record(json!({
            "resourceName": "corpus",
            "contactPerson": [{"surname": "Doe"}, {"surname": "Roe"}],
            "organization": {"name": "ACME"},
        }));

        let entities = record.embedded_entities(CopyStatus::Proxy);

        assert_eq!(entities.len(), 3);
        assert!(entities.iter().all(|e| e.copy_status == CopyStatus::Proxy));
        assert_eq!(entities[2].kind, "organization");

        let entities = record.embedded_entities(CopyStatus::Remote);
        assert!(entities.iter().all(|e| e.copy_status == CopyStatus::Remote));
    }
}
