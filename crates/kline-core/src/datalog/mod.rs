//! Data Logging
//!
//! Registers variables with the ECU, decodes sampled records and keeps a
//! time series of them.

pub mod definitions;
mod format;
mod recorder;
mod session;

pub use definitions::{load_variables, parse_variables, save_variables};
pub use format::{write_csv, write_csv_to, LogFormat};
pub use recorder::{Channel, DataLogger};
pub use session::{LogRecord, LogSession};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single log entry with timestamp and values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp from start of logging
    pub timestamp: Duration,
    /// Channel values (in order of registration)
    pub values: Vec<f64>,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(timestamp: Duration, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }
}
