//! Transport abstraction
//!
//! The K-line adapter exposes two independent capabilities: a byte-oriented
//! serial port and a single digital output pin used for the 5 baud wake-up.

use std::io;

/// Parity setting for the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial line framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineProperties {
    /// Data bits per character (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: Parity,
}

impl LineProperties {
    /// 8 data bits, no parity, 1 stop bit
    pub const EIGHT_N_ONE: LineProperties = LineProperties {
        data_bits: 8,
        stop_bits: 1,
        parity: Parity::None,
    };
}

impl Default for LineProperties {
    fn default() -> Self {
        Self::EIGHT_N_ONE
    }
}

/// Capabilities the protocol engine needs from a K-line adapter
pub trait Transport: Send {
    /// Open the serial side of the adapter
    fn open(&mut self) -> io::Result<()>;

    /// Close the serial side of the adapter
    fn close(&mut self) -> io::Result<()>;

    /// Discard pending input and output
    fn flush(&mut self) -> io::Result<()>;

    /// Change the serial baud rate
    fn set_baud_rate(&mut self, baud: u32) -> io::Result<()>;

    /// Configure character framing
    fn set_line_properties(&mut self, props: LineProperties) -> io::Result<()>;

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when nothing arrived within the transport's poll
    /// interval; callers own the overall deadline.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write every byte of `data`
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Take control of the digital output pin
    fn open_pin(&mut self) -> io::Result<()>;

    /// Select which pins are outputs
    fn set_pin_direction(&mut self, mask: u8) -> io::Result<()>;

    /// Drive the output pins
    fn set_pin_level(&mut self, level: u8) -> io::Result<()>;

    /// Release the digital output pin
    fn close_pin(&mut self) -> io::Result<()>;
}
