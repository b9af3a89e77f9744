//! Protocol commands
//!
//! KWP2000 service identifiers and parameters used on the K-line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// KWP2000 services issued by the tester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Service {
    /// StartDiagnosticSession (0x10)
    StartDiagnosticSession,
    /// ReadEcuIdentification (0x1A)
    ReadEcuIdentification,
    /// ReadMemoryByAddress (0x23)
    ReadMemoryByAddress,
    /// WriteMemoryByAddress (0x3D)
    WriteMemoryByAddress,
    /// TesterPresent (0x3E)
    TesterPresent,
    /// StopCommunication (0x82)
    StopCommunication,
    /// AccessTimingParameter (0x83)
    AccessTimingParameter,
    /// Manufacturer specific logging setup / read (0xB7)
    SetupLogging,
}

impl Service {
    /// Service identifier byte
    pub fn id(&self) -> u8 {
        match self {
            Service::StartDiagnosticSession => 0x10,
            Service::ReadEcuIdentification => 0x1A,
            Service::ReadMemoryByAddress => 0x23,
            Service::WriteMemoryByAddress => 0x3D,
            Service::TesterPresent => 0x3E,
            Service::StopCommunication => 0x82,
            Service::AccessTimingParameter => 0x83,
            Service::SetupLogging => 0xB7,
        }
    }

    /// Id the ECU uses in a positive response
    pub fn positive_response_id(&self) -> u8 {
        self.id() | 0x40
    }
}

/// Sub-function of StartDiagnosticSession that carries a baud code
pub const DIAG_SESSION_SET_BAUD: u8 = 0x86;

/// Sub-function of AccessTimingParameter that sets values
pub const TIMING_SET_VALUES: u8 = 0x03;

/// Sub-function of SetupLogging that defines the logged addresses
pub const LOGGING_DEFINE: u8 = 0x03;

/// Address flag marking a two-byte logged variable
pub const LOGGING_WORD_FLAG: u8 = 0x40;

/// Baud code sent with StartDiagnosticSession
pub fn baud_code(baud: u32) -> Result<u8, ProtocolError> {
    match baud {
        19200 => Ok(0x30),
        38400 => Ok(0x50),
        56000 => Ok(0x63),
        57600 => Ok(0x64),
        other => Err(ProtocolError::UnsupportedBaud(other)),
    }
}

/// How the link is woken up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitMethod {
    /// 5 baud wake-up with address 0x11
    SlowInit,
}

impl FromStr for InitMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow-init" | "SLOW-0x11" => Ok(InitMethod::SlowInit),
            other => Err(ProtocolError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMethod::SlowInit => write!(f, "slow-init"),
        }
    }
}
