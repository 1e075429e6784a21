//! Serial enrichment
//!
//! Records describing a scanned serial, the lookup seam, the HTTP client for
//! the enrichment service and the worker that keeps lookups off the tick
//! thread.

pub mod client;
pub mod parse;
pub mod worker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::EnrichmentClient;
pub use parse::{parse_response, parse_result_fields};
pub use worker::LookupWorker;

/// Outcome of the enrichment lookup for one serial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    /// Lookup submitted, no answer yet
    #[default]
    Pending,
    /// Every field was parsed from the service response
    Success,
    /// Transport, status or parse failure; fields stay at defaults
    Failed,
}

impl LookupStatus {
    /// Whether the record has reached its final state
    pub fn is_final(self) -> bool {
        !matches!(self, LookupStatus::Pending)
    }
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupStatus::Pending => f.write_str("pending"),
            LookupStatus::Success => f.write_str("success"),
            LookupStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Everything known about one scanned serial
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerialRecord {
    pub serial_number: String,
    pub status: LookupStatus,
    pub description: String,
    pub name: String,
    pub a_number: String,
    pub model_id: String,
    pub capacity: String,
    pub color: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub year: i32,
    /// Reference id assigned by the service, 0 until known
    pub result_id: i64,
}

impl SerialRecord {
    /// A freshly sighted serial awaiting its lookup
    pub fn pending(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }

    /// A serial whose lookup failed
    pub fn failed(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            status: LookupStatus::Failed,
            ..Self::default()
        }
    }

    /// Text lines for a device label, empty unless the lookup succeeded
    pub fn label_lines(&self) -> Vec<String> {
        if self.status != LookupStatus::Success {
            return vec![];
        }

        let mut lines = vec![self.name.clone(), self.description.clone()];
        let details: Vec<&str> = [self.capacity.as_str(), self.color.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !details.is_empty() {
            lines.push(details.join(" "));
        }
        lines.push(self.serial_number.clone());
        lines.retain(|line| !line.is_empty());
        lines
    }
}

/// Looks up a serial number and produces its final record.
///
/// Implementations never fail: every problem is reported as a record with
/// [`LookupStatus::Failed`].
#[async_trait]
pub trait SerialLookup: Send + Sync {
    async fn lookup(&self, serial_number: &str) -> SerialRecord;
}
