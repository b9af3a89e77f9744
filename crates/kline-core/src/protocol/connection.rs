//! Connection management
//!
//! Handles the K-line session lifecycle: wake-up handshake, framed command
//! exchange and shutdown.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::{
    commands::{InitMethod, Service},
    config::ConnectionConfig,
    frame::{build_frame_with, ResponseFrame},
    pattern::wait_for,
    serial::{list_ports, PortInfo, SerialTransport},
    transport::{LineProperties, Transport},
    wakeup::WakeupSignaler,
    ProtocolError, INITIAL_BAUD_RATE, KEY_BYTE_ACK, READY_BYTE, SYNC_PATTERN, WAKEUP_ADDRESS,
};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session with the ECU
    Disconnected,
    /// Handshake completed, talking at `baud`
    Connected {
        /// Current line speed
        baud: u32,
    },
}

/// A K-line session with one ECU
pub struct Connection {
    /// Adapter handle, owned exclusively by this session
    transport: Box<dyn Transport>,
    /// Current session state
    state: SessionState,
    /// Connection configuration
    config: ConnectionConfig,
    /// Metrics: cumulative bytes/frames sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl Connection {
    /// Create a session over `transport` (not yet connected)
    pub fn new(config: ConnectionConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            config,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_frames: 0,
            rx_frames: 0,
        }
    }

    /// Create a session on the serial port named in `config`
    pub fn serial(config: ConnectionConfig) -> Self {
        let transport = SerialTransport::new(config.port_name.clone());
        Self::new(config, Box::new(transport))
    }

    /// List available serial ports
    pub fn list_ports() -> Vec<PortInfo> {
        list_ports()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake has completed
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get cumulative tx/rx bytes and frame counters
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_frames, self.rx_frames)
    }

    #[cfg(test)]
    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Change the line speed and give the ECU time to follow
    pub(crate) fn switch_baud(&mut self, baud: u32) -> Result<(), ProtocolError> {
        self.transport.set_baud_rate(baud)?;
        std::thread::sleep(self.config.timing.baud_settle());
        self.state = SessionState::Connected { baud };
        info!("Switched to {} baud", baud);
        Ok(())
    }

    /// Fail with `NotConnected` unless a session is up
    pub(crate) fn ensure_connected(&self) -> Result<(), ProtocolError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ProtocolError::NotConnected)
        }
    }

    /// Connect using a method name such as `"slow-init"`
    pub fn connect(&mut self, method: &str) -> Result<(), ProtocolError> {
        if self.is_connected() {
            return Err(ProtocolError::AlreadyConnected);
        }
        let method: InitMethod = method.parse()?;
        self.connect_with(method)
    }

    /// Connect to the ECU
    pub fn connect_with(&mut self, method: InitMethod) -> Result<(), ProtocolError> {
        if self.is_connected() {
            return Err(ProtocolError::AlreadyConnected);
        }
        info!("Attempting ECU connect with method {}", method);

        match method {
            InitMethod::SlowInit => match self.slow_init() {
                Ok(()) => {
                    self.state = SessionState::Connected {
                        baud: INITIAL_BAUD_RATE,
                    };
                    info!("Connected at {} baud", INITIAL_BAUD_RATE);
                    Ok(())
                }
                Err(e) => {
                    warn!("Handshake failed: {}", e);
                    if let Err(close_err) = self.transport.close() {
                        debug!("Closing transport after failed handshake: {}", close_err);
                    }
                    Err(e)
                }
            },
        }
    }

    fn slow_init(&mut self) -> Result<(), ProtocolError> {
        let timing = self.config.timing.clone();

        // Wake the ECU at 5 baud
        WakeupSignaler::from_timing(&timing).signal(self.transport.as_mut(), WAKEUP_ADDRESS)?;

        // Switch to normal serial traffic
        self.transport.open()?;
        self.transport.set_line_properties(LineProperties::EIGHT_N_ONE)?;
        self.transport.set_baud_rate(INITIAL_BAUD_RATE)?;
        self.transport.flush()?;

        let sync = wait_for(self.transport.as_mut(), &SYNC_PATTERN, timing.sync_timeout());
        self.rx_bytes += sync.captured.len() as u64;
        if sync.found {
            debug!("Sync pattern received");
        } else {
            // Some ECUs answer with different key bytes; the ready byte decides
            warn!(
                "Sync pattern not seen (captured {:02X?}), continuing",
                sync.captured
            );
        }

        std::thread::sleep(timing.post_sync_delay());

        self.write_raw(&[KEY_BYTE_ACK])?;

        let ready = wait_for(self.transport.as_mut(), &[READY_BYTE], timing.ready_timeout());
        self.rx_bytes += ready.captured.len() as u64;
        if ready.found {
            Ok(())
        } else {
            debug!("Captured while waiting for ready: {:02X?}", ready.captured);
            Err(ProtocolError::Timeout("ready byte"))
        }
    }

    /// End the session with StopCommunication and close the transport.
    ///
    /// The transport is closed and the state reset even if the exchange fails.
    pub fn close(&mut self) -> Result<ResponseFrame, ProtocolError> {
        self.ensure_connected()?;
        info!("Closing ECU session");

        let result = self.execute(&[Service::StopCommunication.id()]);
        let closed = self.transport.close();
        self.state = SessionState::Disconnected;

        let response = result?;
        closed?;
        Ok(response)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        trace!("tx {:02X?}", bytes);
        self.transport.write_all(bytes)?;
        self.tx_bytes += bytes.len() as u64;
        Ok(())
    }

    /// Read one byte, failing once `deadline` passes
    fn read_byte(&mut self, deadline: Instant, what: &'static str) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        loop {
            if self.transport.read(&mut buf)? == 1 {
                self.rx_bytes += 1;
                return Ok(buf[0]);
            }
            if Instant::now() > deadline {
                return Err(ProtocolError::Timeout(what));
            }
        }
    }

    /// Frame `payload`, send it and consume its echo.
    ///
    /// Returns whether every echoed byte matched what was sent. A mismatch is
    /// only an error when `strict_echo` is configured.
    pub fn send_command(&mut self, payload: &[u8]) -> Result<bool, ProtocolError> {
        let frame = build_frame_with(payload, self.config.checksum_mode)?;
        debug!("Sending command {:02X?}", frame);
        self.write_raw(&frame)?;
        self.tx_frames += 1;

        let deadline = Instant::now() + self.config.timing.response_timeout();
        let mut echo = Vec::with_capacity(frame.len());
        for _ in 0..frame.len() {
            echo.push(self.read_byte(deadline, "command echo")?);
        }

        if echo == frame {
            Ok(true)
        } else {
            warn!("Echo mismatch: sent {:02X?}, received {:02X?}", frame, echo);
            if self.config.strict_echo {
                return Err(ProtocolError::EchoMismatch {
                    sent: frame,
                    received: echo,
                });
            }
            Ok(false)
        }
    }

    /// Read one length-prefixed response frame.
    ///
    /// Leading zero bytes are skipped; some ECUs emit them before the length.
    pub fn read_response(&mut self) -> Result<ResponseFrame, ProtocolError> {
        let deadline = Instant::now() + self.config.timing.response_timeout();

        let mut length = 0u8;
        while length == 0 {
            length = self.read_byte(deadline, "response length")?;
        }

        let mut raw = Vec::with_capacity(length as usize + 2);
        raw.push(length);
        for _ in 0..length {
            raw.push(self.read_byte(deadline, "response payload")?);
        }
        raw.push(self.read_byte(deadline, "response checksum")?);
        self.rx_frames += 1;

        let frame = ResponseFrame::from_bytes(raw)?;
        let mode = self.config.checksum_mode;
        debug!(
            "Received response {:02X?} (checksum 0x{:02X}, computed 0x{:02X})",
            frame.as_bytes(),
            frame.checksum(),
            frame.computed_checksum(mode)
        );

        if self.config.verify_response_checksum && !frame.checksum_valid(mode) {
            return Err(ProtocolError::ChecksumMismatch {
                expected: frame.computed_checksum(mode),
                actual: frame.checksum(),
            });
        }
        Ok(frame)
    }

    /// Send one request and return its response
    pub fn execute(&mut self, payload: &[u8]) -> Result<ResponseFrame, ProtocolError> {
        self.send_command(payload)?;
        self.read_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::config::TimingConfig;
    use crate::protocol::frame::build_frame;
    use crate::protocol::mock::{MockEvent, MockTransport};
    use crate::protocol::ChecksumMode;
    use pretty_assertions::assert_eq;

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            timing: TimingConfig::immediate(),
            ..ConnectionConfig::default()
        }
    }

    fn connected(mock: &MockTransport) -> Connection {
        let mut conn = Connection::new(test_config(), Box::new(mock.clone()));
        conn.set_state(SessionState::Connected {
            baud: INITIAL_BAUD_RATE,
        });
        conn
    }

    #[test]
    fn test_handshake_sequence() {
        let mock = MockTransport::with_handshake();
        let mut conn = Connection::new(test_config(), Box::new(mock.clone()));
        conn.connect("slow-init").unwrap();

        assert_eq!(conn.state(), SessionState::Connected { baud: 10400 });
        assert_eq!(mock.writes(), vec![vec![0x70]]);
        assert_eq!(mock.pin_levels(), WakeupSignaler::levels(0x11).to_vec());

        let events = mock.events();
        let open_at = events.iter().position(|e| *e == MockEvent::Open).unwrap();
        assert_eq!(
            &events[open_at..open_at + 4],
            &[
                MockEvent::Open,
                MockEvent::Line(LineProperties::EIGHT_N_ONE),
                MockEvent::Baud(10400),
                MockEvent::Flush,
            ]
        );
        // Pin is released before the serial side opens
        let pin_close_at = events.iter().position(|e| *e == MockEvent::PinClose).unwrap();
        assert!(pin_close_at < open_at);
    }

    #[test]
    fn test_handshake_without_ready_byte_fails() {
        let mock = MockTransport::new();
        mock.push_rx(&[0x55, 0xEF, 0x8F]);
        let mut conn = Connection::new(test_config(), Box::new(mock.clone()));

        let err = conn.connect("slow-init").unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout("ready byte")));
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(mock.events().last(), Some(&MockEvent::Close));
    }

    #[test]
    fn test_connect_rejects_unknown_method() {
        let mock = MockTransport::with_handshake();
        let mut conn = Connection::new(test_config(), Box::new(mock.clone()));
        let err = conn.connect("bogus-method").unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedMethod(_)));
        assert!(mock.events().is_empty());
    }

    #[test]
    fn test_connect_twice_fails() {
        let mock = MockTransport::with_handshake();
        let mut conn = Connection::new(test_config(), Box::new(mock));
        conn.connect("slow-init").unwrap();
        assert!(matches!(
            conn.connect("slow-init"),
            Err(ProtocolError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_close_when_disconnected() {
        let mut conn = Connection::new(test_config(), Box::new(MockTransport::new()));
        assert!(matches!(conn.close(), Err(ProtocolError::NotConnected)));
    }

    #[test]
    fn test_close_sends_stop_communication() {
        let mock = MockTransport::new();
        mock.push_reply(&[0x01, 0xC2, 0xC3]);
        let mut conn = connected(&mock);

        let response = conn.close().unwrap();
        assert_eq!(response.as_bytes(), &[0x01, 0xC2, 0xC3]);
        assert_eq!(mock.writes(), vec![vec![0x01, 0x82, 0x83]]);
        assert_eq!(mock.events().last(), Some(&MockEvent::Close));
        assert_eq!(conn.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_close_resets_state_on_silent_bus() {
        let mock = MockTransport::new();
        let mut conn = connected(&mock);
        assert!(matches!(conn.close(), Err(ProtocolError::Timeout(_))));
        assert_eq!(conn.state(), SessionState::Disconnected);
        assert_eq!(mock.events().last(), Some(&MockEvent::Close));
    }

    #[test]
    fn test_send_command_echo() {
        let mock = MockTransport::new();
        let mut conn = connected(&mock);
        assert!(conn.send_command(&[0x3E]).unwrap());
        assert_eq!(mock.writes(), vec![build_frame(&[0x3E]).unwrap()]);
    }

    #[test]
    fn test_send_command_echo_mismatch() {
        let mock = MockTransport::new();
        mock.set_echo(false);
        mock.push_reply(&[0x01, 0x3F, 0x40]);
        let mut conn = connected(&mock);
        assert!(!conn.send_command(&[0x3E]).unwrap());
    }

    #[test]
    fn test_strict_echo_mismatch_is_error() {
        let mock = MockTransport::new();
        mock.set_echo(false);
        mock.push_reply(&[0x00, 0x00, 0x00]);
        let mut conn = Connection::new(
            ConnectionConfig {
                strict_echo: true,
                ..test_config()
            },
            Box::new(mock),
        );
        let err = conn.send_command(&[0x3E]).unwrap_err();
        assert!(matches!(err, ProtocolError::EchoMismatch { .. }));
    }

    #[test]
    fn test_read_response_skips_leading_zeros() {
        let mock = MockTransport::new();
        mock.push_rx(&[0x00, 0x00, 0x02, 0x7E, 0x01, 0x81]);
        let mut conn = connected(&mock);
        let frame = conn.read_response().unwrap();
        assert_eq!(frame.as_bytes(), &[0x02, 0x7E, 0x01, 0x81]);
        assert_eq!(frame.payload(), &[0x7E, 0x01]);
    }

    #[test]
    fn test_read_response_times_out() {
        let mock = MockTransport::new();
        mock.push_rx(&[0x03, 0x01]);
        let mut conn = connected(&mock);
        assert!(matches!(
            conn.read_response(),
            Err(ProtocolError::Timeout("response payload"))
        ));
    }

    #[test]
    fn test_checksum_is_permissive_by_default() {
        let mock = MockTransport::new();
        mock.push_rx(&[0x01, 0x7E, 0x00]);
        let mut conn = connected(&mock);
        let frame = conn.read_response().unwrap();
        assert!(!frame.checksum_valid(ChecksumMode::Legacy));
    }

    #[test]
    fn test_checksum_verification_opt_in() {
        let mock = MockTransport::new();
        mock.push_rx(&[0x01, 0x7E, 0x00]);
        let mut conn = Connection::new(
            ConnectionConfig {
                verify_response_checksum: true,
                ..test_config()
            },
            Box::new(mock),
        );
        conn.set_state(SessionState::Connected { baud: 10400 });
        let err = conn.read_response().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ChecksumMismatch {
                expected: 0x7F,
                actual: 0x00
            }
        ));
    }

    #[test]
    fn test_counters() {
        let mock = MockTransport::new();
        mock.push_reply(&[0x01, 0x7E, 0x7F]);
        let mut conn = connected(&mock);
        conn.execute(&[0x3E]).unwrap();
        // 3 bytes sent, 3 echoed + 3 response bytes received
        assert_eq!(conn.get_counters(), (3, 6, 1, 1));
    }
}
