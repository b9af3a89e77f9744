//! Logging session
//!
//! The ECU can be told to sample a list of addresses together. One request
//! registers the list; each following `0xB7` request returns every value in
//! registration order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::ecu::{Sample, Variable, VariableSize};
use crate::protocol::commands::{Service, LOGGING_DEFINE, LOGGING_WORD_FLAG};
use crate::protocol::{split_address, Connection, ProtocolError, ResponseFrame};

/// Bytes ahead of the sampled values: length and status
const RECORD_HEADER_LEN: usize = 2;

/// One decoded sample of every registered variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    samples: Vec<Sample>,
}

impl LogRecord {
    /// Sample of the named variable
    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.name() == name)
    }

    /// Scaled value of the named variable
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(Sample::value)
    }

    /// Samples in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Scaled values in registration order
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::value).collect()
    }

    /// Name to value mapping
    pub fn to_map(&self) -> HashMap<String, f64> {
        self.samples
            .iter()
            .map(|s| (s.name().to_string(), s.value()))
            .collect()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the record holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl IntoIterator for LogRecord {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

/// Variables registered with the ECU for combined sampling
#[derive(Debug, Clone, Default)]
pub struct LogSession {
    variables: Vec<Arc<Variable>>,
}

impl LogSession {
    /// Create a session with nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered variables in order
    pub fn variables(&self) -> &[Arc<Variable>] {
        &self.variables
    }

    /// Whether variables have been registered
    pub fn is_prepared(&self) -> bool {
        !self.variables.is_empty()
    }

    /// Register variables locally without contacting the ECU, e.g. to decode
    /// records captured earlier
    pub fn set_variables(&mut self, variables: Vec<Variable>) {
        self.variables = variables.into_iter().map(Arc::new).collect();
    }

    /// Bytes needed for one record's values
    pub fn record_size(&self) -> usize {
        self.variables.iter().map(|v| v.size().bytes()).sum()
    }

    /// Build the request that registers `variables`.
    ///
    /// Each address is sent as three bytes; for two-byte variables 0x40 is
    /// added to the top address byte, so their top byte must stay below 0xC0.
    pub fn setup_request(variables: &[Variable]) -> Result<Vec<u8>, ProtocolError> {
        if variables.is_empty() {
            return Err(ProtocolError::NoVariablesRegistered);
        }

        let mut seen = HashSet::new();
        let mut request = Vec::with_capacity(2 + variables.len() * 3);
        request.push(Service::SetupLogging.id());
        request.push(LOGGING_DEFINE);

        for variable in variables {
            if !seen.insert(variable.name()) {
                return Err(ProtocolError::DuplicateVariable(variable.name().to_string()));
            }
            let mut address = split_address(variable.address())?;
            if variable.size() == VariableSize::Word {
                address[0] = address[0]
                    .checked_add(LOGGING_WORD_FLAG)
                    .ok_or(ProtocolError::AddressOutOfRange(variable.address()))?;
            }
            request.extend_from_slice(&address);
        }
        Ok(request)
    }

    /// Register `variables` with the ECU, replacing any previous list.
    ///
    /// The list is kept only when the ECU accepts it.
    pub fn prepare_log_variables(
        &mut self,
        conn: &mut Connection,
        variables: Vec<Variable>,
    ) -> Result<ResponseFrame, ProtocolError> {
        let request = Self::setup_request(&variables)?;
        info!("Registering {} log variables", variables.len());
        let response = reject_negative(conn.request(&request)?)?;
        self.set_variables(variables);
        Ok(response)
    }

    /// Read one record of every registered variable
    pub fn sample(&self, conn: &mut Connection) -> Result<LogRecord, ProtocolError> {
        if !self.is_prepared() {
            return Err(ProtocolError::NoVariablesRegistered);
        }
        let response = reject_negative(conn.request(&[Service::SetupLogging.id()])?)?;
        self.decode_record(response.as_bytes())
    }

    /// Decode a complete record frame: length, status, values, checksum
    pub fn decode_record(&self, frame: &[u8]) -> Result<LogRecord, ProtocolError> {
        if !self.is_prepared() {
            return Err(ProtocolError::NoVariablesRegistered);
        }
        if frame.len() < RECORD_HEADER_LEN + 1 {
            return Err(ProtocolError::UnexpectedFrame(format!(
                "log record of {} bytes is too short",
                frame.len()
            )));
        }

        trace!("log record status 0x{:02X}", frame[1]);
        let data = &frame[RECORD_HEADER_LEN..frame.len() - 1];
        let needed = self.record_size();
        if data.len() < needed {
            return Err(ProtocolError::UnexpectedFrame(format!(
                "log record carries {} value bytes, {} registered",
                data.len(),
                needed
            )));
        }
        if data.len() > needed {
            debug!("Ignoring {} trailing log record bytes", data.len() - needed);
        }

        let mut samples = Vec::with_capacity(self.variables.len());
        let mut pos = 0;
        for variable in &self.variables {
            let width = variable.size().bytes();
            samples.push(Sample::decode(Arc::clone(variable), &data[pos..pos + width])?);
            pos += width;
        }
        Ok(LogRecord { samples })
    }
}

/// Turn a negative response into an error; its bytes are not a log record
fn reject_negative(response: ResponseFrame) -> Result<ResponseFrame, ProtocolError> {
    match response.negative_response_code() {
        Some(code) => Err(ProtocolError::NegativeResponse {
            service: response.payload().get(1).copied().unwrap_or_default(),
            code,
        }),
        None if response.is_negative() => Err(ProtocolError::UnexpectedFrame(format!(
            "truncated negative response {:02X?}",
            response.as_bytes()
        ))),
        None => Ok(response),
    }
}
