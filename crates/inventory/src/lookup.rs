//! Target database lookup capability and the in-memory snapshot that backs it.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::InventoryError;
use crate::model::{IdentityKey, IdentityValue};

/// A target database record: primary key plus every column as an identity value.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRecord {
    pub key: String,
    pub fields: BTreeMap<String, IdentityValue>,
}

impl TargetRecord {
    /// True when every (field, value) in `identity` equals this record's field.
    pub fn matches(&self, identity: &IdentityKey) -> bool {
        identity
            .0
            .iter()
            .all(|(field, value)| self.fields.get(field).is_some_and(|v| v == value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError(pub String);

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for LookupError {}

/// Read-only access to the target database. Implementations must return the
/// same answer for the same key for the duration of a run.
pub trait TargetLookup: Sync {
    fn find(&self, identity: &IdentityKey) -> Result<Vec<TargetRecord>, LookupError>;

    /// Batched form; one result list per key, in key order.
    fn find_batch(&self, identities: &[IdentityKey]) -> Result<Vec<Vec<TargetRecord>>, LookupError> {
        identities.iter().map(|k| self.find(k)).collect()
    }
}

/// Immutable in-memory copy of the target table.
#[derive(Debug, Clone, Default)]
pub struct TargetSnapshot {
    records: Vec<TargetRecord>,
}

impl TargetSnapshot {
    pub fn new(records: Vec<TargetRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a snapshot from CSV text. `key_column` supplies the record key.
    pub fn from_csv(csv_data: &str, key_column: &str) -> Result<Self, InventoryError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| InventoryError::Io(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let key_idx = headers.iter().position(|h| h == key_column).ok_or_else(|| {
            InventoryError::MissingColumn {
                carton: "targetdb".into(),
                row: 0,
                column: key_column.into(),
            }
        })?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| InventoryError::Io(e.to_string()))?;
            let key = record.get(key_idx).unwrap_or("").to_string();
            let fields = headers
                .iter()
                .enumerate()
                .filter_map(|(i, h)| record.get(i).map(|v| (h.clone(), IdentityValue::parse(v))))
                .collect();
            records.push(TargetRecord { key, fields });
        }

        log::debug!("loaded target snapshot: {} records", records.len());
        Ok(Self { records })
    }
}

impl TargetLookup for TargetSnapshot {
    fn find(&self, identity: &IdentityKey) -> Result<Vec<TargetRecord>, LookupError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.matches(identity))
            .cloned()
            .collect())
    }
}
