//! KWP2000 services
//!
//! One method per service, each sending a single request and returning the
//! ECU's response frame unmodified.

use tracing::{debug, warn};

use super::{
    commands::{
        baud_code, Service, DIAG_SESSION_SET_BAUD, TIMING_SET_VALUES,
    },
    frame::{split_address, ResponseFrame},
    Connection, ProtocolError,
};

impl Connection {
    /// Send a request on an established session
    pub fn request(&mut self, payload: &[u8]) -> Result<ResponseFrame, ProtocolError> {
        self.ensure_connected()?;
        let response = self.execute(payload)?;
        if let Some(code) = response.negative_response_code() {
            debug!(
                "ECU rejected service 0x{:02X} with code 0x{:02X}",
                payload.first().copied().unwrap_or_default(),
                code
            );
        }
        Ok(response)
    }

    /// ReadEcuIdentification with the given identification option bytes
    pub fn read_ecu_id(&mut self, param_def: &[u8]) -> Result<ResponseFrame, ProtocolError> {
        let mut payload = vec![Service::ReadEcuIdentification.id()];
        payload.extend_from_slice(param_def);
        self.request(&payload)
    }

    /// StartDiagnosticSession at a new baud rate.
    ///
    /// After a positive answer the transport is switched to `baud` and the
    /// session pauses for the configured settle time. A negative answer is
    /// returned with the line left at its current speed.
    pub fn start_diag_session(&mut self, baud: u32) -> Result<ResponseFrame, ProtocolError> {
        self.ensure_connected()?;
        let code = baud_code(baud)?;
        let response = self.request(&[
            Service::StartDiagnosticSession.id(),
            DIAG_SESSION_SET_BAUD,
            code,
        ])?;
        if response.is_negative() {
            warn!("ECU refused {} baud, staying at current speed", baud);
        } else {
            self.switch_baud(baud)?;
        }
        Ok(response)
    }

    /// AccessTimingParameter, set values
    pub fn access_timing_parameter(&mut self, params: &[u8]) -> Result<ResponseFrame, ProtocolError> {
        let mut payload = vec![Service::AccessTimingParameter.id(), TIMING_SET_VALUES];
        payload.extend_from_slice(params);
        self.request(&payload)
    }

    /// ReadMemoryByAddress with caller-encoded address and length
    pub fn read_memory_by_address(
        &mut self,
        address_and_length: &[u8],
    ) -> Result<ResponseFrame, ProtocolError> {
        let mut payload = vec![Service::ReadMemoryByAddress.id()];
        payload.extend_from_slice(address_and_length);
        self.request(&payload)
    }

    /// ReadMemoryByAddress of `length` bytes at a 24-bit `address`
    pub fn read_memory(&mut self, address: u32, length: u8) -> Result<ResponseFrame, ProtocolError> {
        let mut request = split_address(address)?.to_vec();
        request.push(length);
        self.read_memory_by_address(&request)
    }

    /// WriteMemoryByAddress of `value` at a 24-bit `address`
    pub fn write_memory_by_address(
        &mut self,
        address: u32,
        value: &[u8],
    ) -> Result<ResponseFrame, ProtocolError> {
        let address = split_address(address)?;
        let length = u8::try_from(value.len()).map_err(|_| ProtocolError::FrameTooLong(value.len()))?;

        let mut payload = Vec::with_capacity(value.len() + 5);
        payload.push(Service::WriteMemoryByAddress.id());
        payload.extend_from_slice(&address);
        payload.push(length);
        payload.extend_from_slice(value);
        self.request(&payload)
    }

    /// TesterPresent, keeps the session alive
    pub fn tester_present(&mut self) -> Result<ResponseFrame, ProtocolError> {
        self.request(&[Service::TesterPresent.id()])
    }
}
