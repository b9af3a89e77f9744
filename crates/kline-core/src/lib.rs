//! # K-line Core Library
//!
//! Diagnostic communication with ME7-era engine ECUs over a K-line adapter.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The 5 baud wake-up handshake and KWP2000-style framing
//! - Memory read/write and diagnostic session services
//! - Variable definitions with scaling, masking and sign handling
//! - Combined sampling of registered variables and CSV logging
//!
//! ## Example
//!
//! ```rust,ignore
//! use kline_core::prelude::*;
//!
//! let mut conn = Connection::serial(ConnectionConfig::for_port("/dev/ttyUSB0"));
//! conn.connect("slow-init")?;
//!
//! let mut session = LogSession::new();
//! session.prepare_log_variables(&mut conn, load_variables("vars.json")?)?;
//! let record = session.sample(&mut conn)?;
//! println!("nmot: {:?}", record.value("nmot"));
//!
//! conn.close()?;
//! ```

pub mod datalog;
pub mod ecu;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::datalog::{load_variables, DataLogger, LogEntry, LogRecord, LogSession};
    pub use crate::ecu::{Sample, Variable, VariableSize};
    pub use crate::protocol::{
        Connection, ConnectionConfig, MockTransport, ProtocolError, SessionState, TimingConfig,
        Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
