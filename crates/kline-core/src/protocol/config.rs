//! Connection configuration
//!
//! Timing values are empirically derived for ME7-era K-line ECUs and are kept
//! overridable for other hardware.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{ChecksumMode, ProtocolError, DEFAULT_TIMEOUT_MS};

/// Handshake and session timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Line held high before the wake-up byte
    pub wake_idle_ms: u64,
    /// Bit time of the 5 baud wake-up byte
    pub wake_bit_ms: u64,
    /// How long to wait for the sync pattern after wake-up
    pub sync_timeout_ms: u64,
    /// Pause between the sync pattern and the key byte acknowledgement
    pub post_sync_delay_ms: u64,
    /// How long to wait for the ready byte
    pub ready_timeout_ms: u64,
    /// Pause after switching baud rate
    pub baud_settle_ms: u64,
    /// Deadline for reading an echo or a response frame
    pub response_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wake_idle_ms: 500,
            wake_bit_ms: 200,
            sync_timeout_ms: 1000,
            post_sync_delay_ms: 26,
            ready_timeout_ms: 1000,
            baud_settle_ms: 1000,
            response_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    /// No sleeps, short deadlines. Only useful against an in-memory transport.
    pub fn immediate() -> Self {
        Self {
            wake_idle_ms: 0,
            wake_bit_ms: 0,
            sync_timeout_ms: 50,
            post_sync_delay_ms: 0,
            ready_timeout_ms: 50,
            baud_settle_ms: 0,
            response_timeout_ms: 50,
        }
    }

    /// Line idle before the wake-up start bit
    pub fn wake_idle(&self) -> Duration {
        Duration::from_millis(self.wake_idle_ms)
    }

    /// Duration of one wake-up bit
    pub fn wake_bit(&self) -> Duration {
        Duration::from_millis(self.wake_bit_ms)
    }

    /// Deadline for the sync pattern
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Pause before acknowledging the key bytes
    pub fn post_sync_delay(&self) -> Duration {
        Duration::from_millis(self.post_sync_delay_ms)
    }

    /// Deadline for the ready byte
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Pause after switching baud rate
    pub fn baud_settle(&self) -> Duration {
        Duration::from_millis(self.baud_settle_ms)
    }

    /// Deadline for each echo or response
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Handshake and session timing
    pub timing: TimingConfig,
    /// Checksum formula used for outgoing frames and response verification
    pub checksum_mode: ChecksumMode,
    /// Reject responses whose checksum byte does not match
    pub verify_response_checksum: bool,
    /// Treat an echo mismatch as a fatal error instead of a warning
    pub strict_echo: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            timing: TimingConfig::default(),
            checksum_mode: ChecksumMode::default(),
            verify_response_checksum: false,
            strict_echo: false,
        }
    }
}

impl ConnectionConfig {
    /// Configuration for the given port with default timing
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    ///
    /// An unreadable file is reported as `InvalidConfig`, not as a transport
    /// failure.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.timing.response_timeout_ms == 0 {
            return Err(ProtocolError::InvalidConfig(
                "response_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.timing.ready_timeout_ms == 0 {
            return Err(ProtocolError::InvalidConfig(
                "ready_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_hardware_constants() {
        let timing = TimingConfig::default();
        assert_eq!(timing.wake_idle(), Duration::from_millis(500));
        assert_eq!(timing.wake_bit(), Duration::from_millis(200));
        assert_eq!(timing.post_sync_delay(), Duration::from_millis(26));
        assert_eq!(timing.baud_settle(), Duration::from_secs(1));

        let config = ConnectionConfig::default();
        assert_eq!(config.checksum_mode, ChecksumMode::Legacy);
        assert!(!config.verify_response_checksum);
        assert!(!config.strict_echo);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ConnectionConfig::from_json(
            r#"{"port_name": "/dev/ttyUSB0", "timing": {"post_sync_delay_ms": 30}, "checksum_mode": "standard"}"#,
        )
        .unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.timing.post_sync_delay_ms, 30);
        assert_eq!(config.timing.wake_bit_ms, 200);
        assert_eq!(config.checksum_mode, ChecksumMode::Standard);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionConfig::from_json_file(dir.path().join("kline.json")).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(ref msg) if msg.contains("kline.json")));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_zero_response_timeout_rejected() {
        let err = ConnectionConfig::from_json(r#"{"timing": {"response_timeout_ms": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(_)));
    }
}
