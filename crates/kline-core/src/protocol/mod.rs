//! K-line Protocol Communication
//!
//! Implements the 5 baud wake-up handshake and the KWP2000-style framed
//! command/response exchange used by ME7-era engine ECUs.
//!
//! The bus is half-duplex: every byte the tester sends is echoed back before
//! the ECU's answer, and only one request is ever in flight.

pub mod commands;
pub mod config;
mod connection;
mod error;
pub mod frame;
pub mod mock;
pub mod pattern;
pub mod serial;
mod session;
pub mod transport;
pub mod wakeup;

pub use commands::{InitMethod, Service};
pub use config::{ConnectionConfig, TimingConfig};
pub use connection::{Connection, SessionState};
pub use error::{ErrorKind, ProtocolError};
pub use frame::{build_frame, build_frame_with, checksum, split_address, ChecksumMode, ResponseFrame};
pub use mock::MockTransport;
pub use pattern::{wait_for, PatternMatch};
pub use serial::{list_ports, PortInfo, SerialTransport};
pub use transport::{LineProperties, Parity, Transport};
pub use wakeup::WakeupSignaler;

/// Line speed right after the wake-up handshake
pub const INITIAL_BAUD_RATE: u32 = 10400;

/// Address clocked out at 5 baud to wake the ECU
pub const WAKEUP_ADDRESS: u8 = 0x11;

/// Sync byte and key bytes the ECU answers the wake-up with
pub const SYNC_PATTERN: [u8; 3] = [0x55, 0xEF, 0x8F];

/// Tester acknowledgement of the key bytes
pub const KEY_BYTE_ACK: u8 = 0x70;

/// ECU confirmation that the session is up
pub const READY_BYTE: u8 = 0xEE;

/// Service id of a negative response
pub const NEGATIVE_RESPONSE: u8 = 0x7F;

/// Default deadline for echoes and responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Largest payload a one-byte length field can describe
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Highest address expressible in three bytes
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;
