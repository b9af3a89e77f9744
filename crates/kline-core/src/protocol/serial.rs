//! Serial port handling
//!
//! Provides a [`Transport`] backed by a USB K-line adapter through the
//! `serialport` crate.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

use super::transport::{LineProperties, Parity, Transport};
use super::INITIAL_BAUD_RATE;

/// Read poll interval for the serial port
const READ_POLL_MS: u64 = 50;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// K-line cables are FTDI based, so ttyUSB* sorts first, then ttyACM*, then the rest.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in a deterministic order
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Some udev setups hide adapters from the enumeration API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

fn to_io(e: serialport::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "serial port is not open")
}

/// Apply character framing to an open port
fn configure_port(port: &mut dyn SerialPort, props: LineProperties) -> io::Result<()> {
    let data_bits = match props.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        n => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported data bits: {}", n),
            ))
        }
    };
    let stop_bits = match props.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        n => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported stop bits: {}", n),
            ))
        }
    };
    let parity = match props.parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    };

    port.set_data_bits(data_bits).map_err(to_io)?;
    port.set_stop_bits(stop_bits).map_err(to_io)?;
    port.set_parity(parity).map_err(to_io)?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(to_io)
}

/// K-line adapter on a serial port.
///
/// The wake-up pin is emulated with the UART break condition: level 0 holds
/// TX low (break set), level 1 releases it.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    line: LineProperties,
    port: Option<Box<dyn SerialPort>>,
    /// The port was opened by `open_pin` and must be closed by `close_pin`
    pin_owns_port: bool,
    pin_mask: u8,
}

impl SerialTransport {
    /// Create a transport for the named port (not yet opened)
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: INITIAL_BAUD_RATE,
            line: LineProperties::EIGHT_N_ONE,
            port: None,
            pin_owns_port: false,
            pin_mask: 0,
        }
    }

    /// Port name this transport talks to
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn open_port(&self) -> io::Result<Box<dyn SerialPort>> {
        let mut port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(READ_POLL_MS))
            .open()
            .map_err(to_io)?;
        configure_port(port.as_mut(), self.line)?;
        Ok(port)
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(not_open)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> io::Result<()> {
        if self.port.is_none() {
            debug!("Opening serial port {} at {} baud", self.port_name, self.baud_rate);
            self.port = Some(self.open_port()?);
        }
        self.pin_owns_port = false;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.port_name);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port_mut()?
            .clear(serialport::ClearBuffer::All)
            .map_err(to_io)
    }

    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()> {
        self.baud_rate = baud;
        if let Some(port) = self.port.as_mut() {
            port.set_baud_rate(baud).map_err(to_io)?;
        }
        Ok(())
    }

    fn set_line_properties(&mut self, props: LineProperties) -> io::Result<()> {
        self.line = props;
        if let Some(port) = self.port.as_mut() {
            configure_port(port.as_mut(), props)?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port_mut()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        trace!("serial tx {:02X?}", data);
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()
    }

    fn open_pin(&mut self) -> io::Result<()> {
        if self.port.is_none() {
            self.port = Some(self.open_port()?);
            self.pin_owns_port = true;
        }
        Ok(())
    }

    fn set_pin_direction(&mut self, mask: u8) -> io::Result<()> {
        if mask & 0x01 == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "only the TX line (bit 0) can be driven",
            ));
        }
        self.pin_mask = mask;
        Ok(())
    }

    fn set_pin_level(&mut self, level: u8) -> io::Result<()> {
        let drive_low = level & self.pin_mask & 0x01 == 0;
        let port = self.port_mut()?;
        if drive_low {
            port.set_break().map_err(to_io)
        } else {
            port.clear_break().map_err(to_io)
        }
    }

    fn close_pin(&mut self) -> io::Result<()> {
        if let Some(port) = self.port.as_mut() {
            port.clear_break().map_err(to_io)?;
        }
        self.pin_mask = 0;
        if self.pin_owns_port {
            self.port = None;
            self.pin_owns_port = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Only checks enumeration does not panic on this host
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyACM1",
            "/dev/ttyUSB1",
            "/dev/ttyUSB0",
            "/dev/someport",
            "/dev/ttyACM0",
            "/dev/ttyUSB10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo::bare(n.to_string()))
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_unopened_port_rejects_io() {
        let mut transport = SerialTransport::new("/dev/does-not-exist");
        let mut buf = [0u8; 1];
        let err = transport.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(transport.flush().is_err());
        // Baud changes are remembered until the port opens
        transport.set_baud_rate(38400).unwrap();
        assert_eq!(transport.baud_rate, 38400);
    }

    #[test]
    fn test_pin_direction_requires_tx_bit() {
        let mut transport = SerialTransport::new("/dev/does-not-exist");
        assert!(transport.set_pin_direction(0x02).is_err());
        assert!(transport.set_pin_direction(0x01).is_ok());
    }
}
