//! Byte pattern matching with a deadline
//!
//! Used during the handshake, where the ECU's answer may be preceded by line
//! noise or our own echo.

use std::time::{Duration, Instant};
use tracing::{trace, warn};

use super::transport::Transport;

/// Outcome of [`wait_for`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
    /// Whether the whole pattern was seen
    pub found: bool,
    /// Bytes of the pattern matched so far
    pub matched: Vec<u8>,
    /// Every byte received while waiting
    pub captured: Vec<u8>,
}

/// Read byte by byte until `pattern` has been seen or `timeout` elapses.
///
/// A mismatch restarts matching from the beginning of the pattern, which is
/// sufficient because the handshake patterns have no self-overlap. A read
/// error ends the wait as not found.
pub fn wait_for(transport: &mut dyn Transport, pattern: &[u8], timeout: Duration) -> PatternMatch {
    let mut result = PatternMatch::default();
    if pattern.is_empty() {
        result.found = true;
        return result;
    }

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 1];

    while Instant::now() <= deadline {
        match transport.read(&mut buf) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(e) => {
                warn!("Read failed while waiting for {:02X?}: {}", pattern, e);
                break;
            }
        }

        let byte = buf[0];
        trace!("wait_for rx 0x{:02X}", byte);
        result.captured.push(byte);

        if byte == pattern[result.matched.len()] {
            result.matched.push(byte);
        } else {
            result.matched.clear();
        }

        if result.matched.len() == pattern.len() {
            result.found = true;
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockTransport;
    use pretty_assertions::assert_eq;

    const SYNC: [u8; 3] = [0x55, 0xEF, 0x8F];

    #[test]
    fn test_finds_pattern_after_noise() {
        let mut mock = MockTransport::new();
        mock.push_rx(&[0x00, 0x55, 0x12, 0x55, 0xEF, 0x8F, 0x99]);
        let m = wait_for(&mut mock, &SYNC, Duration::from_millis(50));
        assert!(m.found);
        assert_eq!(m.matched, SYNC.to_vec());
        assert_eq!(m.captured, vec![0x00, 0x55, 0x12, 0x55, 0xEF, 0x8F]);
        // Bytes after the match stay unread
        assert_eq!(mock.pending_rx(), 1);
    }

    #[test]
    fn test_times_out_with_partial_match() {
        let mut mock = MockTransport::new();
        mock.push_rx(&[0x55, 0xEF]);
        let m = wait_for(&mut mock, &SYNC, Duration::from_millis(20));
        assert!(!m.found);
        assert_eq!(m.matched, vec![0x55, 0xEF]);
        assert_eq!(m.captured, vec![0x55, 0xEF]);
    }

    #[test]
    fn test_read_error_aborts() {
        let mut mock = MockTransport::new();
        mock.push_rx(&[0xEE]);
        mock.fail_reads(true);
        let started = Instant::now();
        let m = wait_for(&mut mock, &[0xEE], Duration::from_secs(5));
        assert!(!m.found);
        assert!(m.captured.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_single_byte_pattern() {
        let mut mock = MockTransport::new();
        mock.push_rx(&[0x70, 0xEE]);
        let m = wait_for(&mut mock, &[0xEE], Duration::from_millis(50));
        assert!(m.found);
        assert_eq!(m.captured, vec![0x70, 0xEE]);
    }
}
