//! 5 baud wake-up
//!
//! Before normal serial traffic the ECU expects an address byte clocked out
//! by hand at 5 baud (8N1, 200 ms per bit). The tester drives the K-line
//! through the adapter's output pin to produce it.

use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::config::TimingConfig;
use super::transport::Transport;

/// Pin mask of the K-line TX output
const KLINE_PIN: u8 = 0x01;

const LEVEL_HIGH: u8 = 1;
const LEVEL_LOW: u8 = 0;

/// Drives the wake-up byte onto the K-line
#[derive(Debug, Clone, Copy)]
pub struct WakeupSignaler {
    idle: Duration,
    bit_time: Duration,
}

impl WakeupSignaler {
    /// Create a signaler with explicit timings
    pub fn new(idle: Duration, bit_time: Duration) -> Self {
        Self { idle, bit_time }
    }

    /// Create a signaler from connection timing
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.wake_idle(), timing.wake_bit())
    }

    /// Pin levels emitted for `byte`: idle, start bit, data bits LSB first, idle
    pub fn levels(byte: u8) -> [u8; 11] {
        let mut levels = [LEVEL_HIGH; 11];
        levels[1] = LEVEL_LOW;
        for i in 0..8 {
            levels[2 + i] = (byte >> i) & 1;
        }
        levels
    }

    /// Emit `byte` on the pin and release it.
    ///
    /// The pin is released even when a level change fails; the first error is
    /// returned.
    pub fn signal(&self, transport: &mut dyn Transport, byte: u8) -> io::Result<()> {
        debug!("Sending wake-up byte 0x{:02X} at 5 baud", byte);
        transport.open_pin()?;
        let result = self.drive(transport, byte);
        let closed = transport.close_pin();
        result.and(closed)
    }

    fn drive(&self, transport: &mut dyn Transport, byte: u8) -> io::Result<()> {
        transport.set_pin_direction(KLINE_PIN)?;

        let levels = Self::levels(byte);
        let start = Instant::now();

        // Idle for the leading period
        transport.set_pin_level(levels[0])?;
        let mut deadline = start + self.idle;

        // Start bit and data bits, one bit time each. Deadlines are absolute
        // so scheduler jitter does not accumulate across bits.
        for &level in &levels[1..10] {
            sleep_until(deadline);
            trace!("wake-up bit level {}", level);
            transport.set_pin_level(level)?;
            deadline += self.bit_time;
        }
        sleep_until(deadline);

        transport.set_pin_level(levels[10])
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}
