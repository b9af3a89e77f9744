//! Protocol errors

use thiserror::Error;

use crate::ecu::VariableError;

/// Broad classification of a [`ProtocolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The ECU answered with something we did not expect
    Protocol,
    /// The operation is not valid in the current session state
    State,
    /// A deadline expired while waiting for the ECU
    Timeout,
    /// The caller supplied an invalid argument or definition
    Validation,
    /// A scaling rule hit a singularity
    Arithmetic,
    /// The underlying transport failed
    Transport,
}

/// Errors that can occur during K-line communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Echo mismatch: sent {sent:02X?}, received {received:02X?}")]
    EchoMismatch { sent: Vec<u8>, received: Vec<u8> },

    #[error("Unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("ECU rejected service {service:#04x} with code {code:#04x}")]
    NegativeResponse { service: u8, code: u8 },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Frame too long: {0} payload bytes (max 255)")]
    FrameTooLong(usize),

    #[error("Already connected, close the session before reconnecting")]
    AlreadyConnected,

    #[error("Not connected to ECU")]
    NotConnected,

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Address {0:#x} does not fit in 24 bits")]
    AddressOutOfRange(u32),

    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaud(u32),

    #[error("Unknown connection method: {0}")]
    UnsupportedMethod(String),

    #[error("Variable '{0}' registered more than once")]
    DuplicateVariable(String),

    #[error("No variables registered for logging")]
    NoVariablesRegistered,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::EchoMismatch { .. }
            | ProtocolError::UnexpectedFrame(_)
            | ProtocolError::NegativeResponse { .. }
            | ProtocolError::ChecksumMismatch { .. } => ErrorKind::Protocol,
            ProtocolError::AlreadyConnected | ProtocolError::NotConnected => ErrorKind::State,
            ProtocolError::Timeout(_) => ErrorKind::Timeout,
            ProtocolError::Variable(VariableError::DivisionByZero { .. }) => ErrorKind::Arithmetic,
            ProtocolError::Transport(_) => ErrorKind::Transport,
            ProtocolError::FrameTooLong(_)
            | ProtocolError::AddressOutOfRange(_)
            | ProtocolError::UnsupportedBaud(_)
            | ProtocolError::UnsupportedMethod(_)
            | ProtocolError::DuplicateVariable(_)
            | ProtocolError::NoVariablesRegistered
            | ProtocolError::InvalidConfig(_)
            | ProtocolError::Variable(_)
            | ProtocolError::Json(_) => ErrorKind::Validation,
        }
    }
}
