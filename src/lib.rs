//! serial-scanner - Live serial-number scanner
//!
//! Reads device serial numbers from a camera feed, deduplicates them and
//! enriches each new serial through a lookup service.

pub mod capture;
pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod shared;
pub mod storage;
pub mod vision;

pub use error::{Result, ScanError};
pub use pipeline::{ScanPipeline, TickReport};
