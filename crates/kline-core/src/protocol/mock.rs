//! Scripted in-memory transport
//!
//! Behaves like an ECU on a half-duplex K-line: every write is echoed back,
//! followed by the next scripted reply. Clones share state, so a test can keep
//! a handle for inspection after boxing one into a [`Connection`].
//!
//! [`Connection`]: super::Connection

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::transport::{LineProperties, Transport};

/// One observable call made against a [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Serial side opened
    Open,
    /// Serial side closed
    Close,
    /// Buffers flushed
    Flush,
    /// Baud rate changed
    Baud(u32),
    /// Line framing changed
    Line(LineProperties),
    /// Bytes written
    Write(Vec<u8>),
    /// Pin opened
    PinOpen,
    /// Pin direction mask set
    PinDirection(u8),
    /// Pin level driven
    PinLevel(u8),
    /// Pin released
    PinClose,
}

#[derive(Debug, Default)]
struct MockState {
    rx: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    events: Vec<MockEvent>,
    echo: bool,
    fail_reads: bool,
    fail_writes: bool,
}

/// Deterministic transport for tests and dry runs
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock that echoes every write
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                echo: true,
                ..MockState::default()
            })),
        }
    }

    /// Create a mock that answers a slow-init handshake
    pub fn with_handshake() -> Self {
        let mock = Self::new();
        mock.push_rx(&[0x55, 0xEF, 0x8F]);
        mock.push_reply(&[0xEE]);
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enable or disable echoing of written bytes
    pub fn set_echo(&self, echo: bool) {
        self.lock().echo = echo;
    }

    /// Make every subsequent read fail
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make bytes available to read immediately
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Queue bytes delivered after the echo of the next write
    pub fn push_reply(&self, bytes: &[u8]) {
        self.lock().replies.push_back(bytes.to_vec());
    }

    /// All calls made so far
    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }

    /// Payloads of every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Levels driven on the pin, in order
    pub fn pin_levels(&self) -> Vec<u8> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::PinLevel(level) => Some(*level),
                _ => None,
            })
            .collect()
    }

    /// Bytes not yet consumed by reads
    pub fn pending_rx(&self) -> usize {
        self.lock().rx.len()
    }

    fn record(&self, event: MockEvent) {
        self.lock().events.push(event);
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> io::Result<()> {
        self.record(MockEvent::Open);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.record(MockEvent::Close);
        Ok(())
    }

    /// Recorded only: scripted bytes are never discarded
    fn flush(&mut self) -> io::Result<()> {
        self.record(MockEvent::Flush);
        Ok(())
    }

    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()> {
        self.record(MockEvent::Baud(baud));
        Ok(())
    }

    fn set_line_properties(&mut self, props: LineProperties) -> io::Result<()> {
        self.record(MockEvent::Line(props));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure"));
        }
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.events.push(MockEvent::Write(data.to_vec()));
        if state.echo {
            state.rx.extend(data.iter().copied());
        }
        if let Some(reply) = state.replies.pop_front() {
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn open_pin(&mut self) -> io::Result<()> {
        self.record(MockEvent::PinOpen);
        Ok(())
    }

    fn set_pin_direction(&mut self, mask: u8) -> io::Result<()> {
        self.record(MockEvent::PinDirection(mask));
        Ok(())
    }

    fn set_pin_level(&mut self, level: u8) -> io::Result<()> {
        self.record(MockEvent::PinLevel(level));
        Ok(())
    }

    fn close_pin(&mut self) -> io::Result<()> {
        self.record(MockEvent::PinClose);
        Ok(())
    }
}
