//! Frame encoding/decoding
//!
//! KWP2000 frames on this bus have no header bytes:
//! - 1 byte: payload length
//! - N bytes: payload (service id first)
//! - 1 byte: additive checksum of length + payload

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::{ProtocolError, MAX_ADDRESS, MAX_PAYLOAD_SIZE, NEGATIVE_RESPONSE};

/// Checksum formula
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumMode {
    /// `(sum & 0xFF) % 0xFF`, bit-compatible with the legacy tooling.
    /// A byte sum of exactly 0xFF yields 0.
    #[default]
    Legacy,
    /// Plain sum modulo 256
    Standard,
}

impl ChecksumMode {
    /// Compute the checksum of `bytes`
    pub fn compute(self, bytes: &[u8]) -> u8 {
        let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        match self {
            ChecksumMode::Legacy => sum % 0xFF,
            ChecksumMode::Standard => sum,
        }
    }
}

/// Legacy KWP2000 checksum of a byte sequence
pub fn checksum(bytes: &[u8]) -> u8 {
    ChecksumMode::Legacy.compute(bytes)
}

/// Wrap `payload` in a length byte and a legacy checksum
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    build_frame_with(payload, ChecksumMode::Legacy)
}

/// Wrap `payload` in a length byte and a checksum computed with `mode`
pub fn build_frame_with(payload: &[u8], mode: ChecksumMode) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLong(payload.len()));
    }
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(mode.compute(&frame));
    Ok(frame)
}

/// Split a 24-bit address into three bytes, most significant first
pub fn split_address(address: u32) -> Result<[u8; 3], ProtocolError> {
    if address > MAX_ADDRESS {
        return Err(ProtocolError::AddressOutOfRange(address));
    }
    let mut bytes = [0u8; 3];
    BigEndian::write_u24(&mut bytes, address);
    Ok(bytes)
}

/// A response read from the ECU: `[length][payload...][checksum]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    raw: Vec<u8>,
}

impl ResponseFrame {
    /// Wrap a complete frame, checking that the length byte matches
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, ProtocolError> {
        match raw.first() {
            Some(&len) if len as usize + 2 == raw.len() => Ok(Self { raw }),
            Some(&len) => Err(ProtocolError::UnexpectedFrame(format!(
                "length byte {} does not match {} received bytes",
                len,
                raw.len()
            ))),
            None => Err(ProtocolError::UnexpectedFrame("empty frame".into())),
        }
    }

    /// Length byte (payload size)
    pub fn len(&self) -> usize {
        self.raw[0] as usize
    }

    /// True when the frame carries no payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload between the length byte and the checksum
    pub fn payload(&self) -> &[u8] {
        &self.raw[1..self.raw.len() - 1]
    }

    /// Checksum byte as received
    pub fn checksum(&self) -> u8 {
        self.raw[self.raw.len() - 1]
    }

    /// Checksum recomputed over length + payload
    pub fn computed_checksum(&self, mode: ChecksumMode) -> u8 {
        mode.compute(&self.raw[..self.raw.len() - 1])
    }

    /// Whether the received checksum matches
    pub fn checksum_valid(&self, mode: ChecksumMode) -> bool {
        self.checksum() == self.computed_checksum(mode)
    }

    /// First payload byte (response service id)
    pub fn service_id(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    /// Whether this is a KWP2000 negative response (0x7F)
    pub fn is_negative(&self) -> bool {
        self.service_id() == Some(NEGATIVE_RESPONSE)
    }

    /// Response code of a negative response
    pub fn negative_response_code(&self) -> Option<u8> {
        if self.is_negative() {
            self.payload().get(2).copied()
        } else {
            None
        }
    }

    /// The whole frame, length and checksum included
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consume the frame and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }
}

impl AsRef<[u8]> for ResponseFrame {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}
