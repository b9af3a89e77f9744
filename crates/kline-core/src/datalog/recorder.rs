//! Data logger / recorder
//!
//! Records sampled log records over time.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::format::write_csv;
use super::{LogEntry, LogRecord};
use crate::ecu::Variable;

/// Maximum entries to keep in memory
const MAX_BUFFER_SIZE: usize = 10000;

/// A recorded column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Variable name
    pub name: String,
    /// Unit label, possibly empty
    pub unit: String,
}

impl Channel {
    /// Column header, e.g. `nmot (rpm)`
    pub fn label(&self) -> String {
        if self.unit.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.unit)
        }
    }
}

/// Data logger state
pub struct DataLogger {
    /// Recorded columns
    channels: Vec<Channel>,
    /// In-memory log buffer
    buffer: VecDeque<LogEntry>,
    /// Start time of logging
    start_time: Option<Instant>,
    /// Wall-clock start of logging
    started_at: Option<DateTime<Utc>>,
    /// Whether logging is active
    is_recording: bool,
    /// Target sample rate in Hz
    sample_rate: f64,
    /// Last sample time
    last_sample: Option<Instant>,
}

impl DataLogger {
    /// Create a logger recording the given variables
    pub fn new(variables: &[Arc<Variable>]) -> Self {
        let channels = variables
            .iter()
            .map(|v| Channel {
                name: v.name().to_string(),
                unit: v.unit().to_string(),
            })
            .collect();
        Self {
            channels,
            buffer: VecDeque::with_capacity(MAX_BUFFER_SIZE),
            start_time: None,
            started_at: None,
            is_recording: false,
            sample_rate: 10.0, // Default 10 Hz
            last_sample: None,
        }
    }

    /// Set the target sample rate in Hz
    pub fn set_sample_rate(&mut self, rate: f64) {
        self.sample_rate = rate.clamp(1.0, 200.0);
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Start recording
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.started_at = Some(Utc::now());
        self.is_recording = true;
        self.last_sample = None;
        self.buffer.clear();
    }

    /// Stop recording
    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    /// Check if recording is active
    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Wall-clock time recording started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Record a sample.
    ///
    /// Returns whether the record was kept; records arriving faster than the
    /// sample rate are dropped.
    pub fn record(&mut self, record: &LogRecord) -> bool {
        if !self.is_recording {
            return false;
        }

        let matches_channels = record.len() == self.channels.len()
            && record
                .iter()
                .zip(&self.channels)
                .all(|(sample, channel)| sample.name() == channel.name);
        if !matches_channels {
            warn!("Log record does not match recorded channels, dropping");
            return false;
        }

        let now = Instant::now();

        let min_interval = Duration::from_secs_f64(1.0 / self.sample_rate);
        if let Some(last) = self.last_sample {
            if now.duration_since(last) < min_interval {
                return false;
            }
        }

        let timestamp = self
            .start_time
            .map(|start| now.duration_since(start))
            .unwrap_or_default();

        if self.buffer.len() >= MAX_BUFFER_SIZE {
            self.buffer.pop_front();
        }

        self.buffer.push_back(LogEntry::new(timestamp, record.values()));
        self.last_sample = Some(now);
        true
    }

    /// Get the number of recorded entries
    pub fn entry_count(&self) -> usize {
        self.buffer.len()
    }

    /// Get all entries
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.buffer.iter()
    }

    /// Get the recorded columns
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Clear all recorded data
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start_time = None;
        self.started_at = None;
        self.last_sample = None;
    }

    /// Write the recorded entries as CSV
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        write_csv(path, &self.channels, &self.buffer)
    }
}
