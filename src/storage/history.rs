//! Serial history
//!
//! Insertion-ordered, deduplicated record of every accepted serial number.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::lookup::{LookupStatus, SerialRecord};

/// Every serial seen this session, at most one record per serial
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SerialRecord>", into = "Vec<SerialRecord>")]
pub struct SerialHistory {
    records: Vec<SerialRecord>,
    index: HashMap<String, usize>,
}

impl SerialHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record for `serial_number` exists
    pub fn contains(&self, serial_number: &str) -> bool {
        self.index.contains_key(serial_number)
    }

    /// Append `record` unless its serial is already present.
    ///
    /// Returns `true` when the record was appended.
    pub fn append_if_absent(&mut self, record: SerialRecord) -> bool {
        if self.contains(&record.serial_number) {
            return false;
        }
        self.index
            .insert(record.serial_number.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Name and status of the record for `serial_number`
    pub fn find(&self, serial_number: &str) -> Option<(&str, LookupStatus)> {
        self.get(serial_number)
            .map(|record| (record.name.as_str(), record.status))
    }

    /// The record for `serial_number`
    pub fn get(&self, serial_number: &str) -> Option<&SerialRecord> {
        self.index.get(serial_number).map(|&i| &self.records[i])
    }

    /// Replace a pending record with its final lookup result.
    ///
    /// Only `Pending` records can be completed and only with a final status,
    /// so a record never moves backwards. Returns `true` when applied.
    pub fn complete(&mut self, record: SerialRecord) -> bool {
        if !record.status.is_final() {
            return false;
        }
        let Some(&i) = self.index.get(&record.serial_number) else {
            debug!("Dropping result for unknown serial {}", record.serial_number);
            return false;
        };
        if self.records[i].status != LookupStatus::Pending {
            return false;
        }
        self.records[i] = record;
        true
    }

    /// Number of records with a non-empty name
    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|r| !r.name.is_empty()).count()
    }

    /// Number of records still waiting for their lookup
    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == LookupStatus::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &SerialRecord> {
        self.records.iter()
    }
}

impl From<Vec<SerialRecord>> for SerialHistory {
    fn from(records: Vec<SerialRecord>) -> Self {
        let mut history = Self::new();
        for record in records {
            history.append_if_absent(record);
        }
        history
    }
}

impl From<SerialHistory> for Vec<SerialRecord> {
    fn from(history: SerialHistory) -> Self {
        history.records
    }
}
