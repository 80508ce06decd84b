//! Newline-delimited reader over a byte-oriented UART.

use core::fmt::Debug;

use embedded_io::{Read, ReadReady};
use esp_hal::time::{Duration, Instant};
use plantlink_core::frame::{Line, LineSource};

const NEWLINE: u8 = b'\n';

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineError<E> {
    /// No terminator within the line timeout.
    Timeout,
    Uart(E),
}

/// [`LineSource`] over any `embedded-io` reader.
///
/// With a timeout, a line that does not finish in time fails with
/// [`LineError::Timeout`]; without one, reads wait for the terminator
/// indefinitely.
pub struct UartLines<U> {
    uart: U,
    timeout: Option<Duration>,
}

impl<U> UartLines<U>
where
    U: Read + ReadReady,
    U::Error: Debug,
{
    pub fn new(uart: U, timeout: Option<Duration>) -> Self {
        Self { uart, timeout }
    }

    pub fn release(self) -> U {
        self.uart
    }

    fn read_byte(&mut self, started: Instant) -> Result<u8, LineError<U::Error>> {
        loop {
            if self.uart.read_ready().map_err(LineError::Uart)? {
                let mut byte = [0u8; 1];
                if self.uart.read(&mut byte).map_err(LineError::Uart)? == 1 {
                    return Ok(byte[0]);
                }
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() > timeout {
                    return Err(LineError::Timeout);
                }
            }
        }
    }
}

impl<U> LineSource for UartLines<U>
where
    U: Read + ReadReady,
    U::Error: Debug,
{
    type Error = LineError<U::Error>;

    fn bytes_available(&mut self) -> bool {
        self.uart.read_ready().unwrap_or(false)
    }

    fn read_line(&mut self, line: &mut Line) -> Result<(), Self::Error> {
        line.clear();
        let started = Instant::now();

        loop {
            let byte = self.read_byte(started)?;
            if byte == NEWLINE {
                return Ok(());
            }
            // Overlong lines keep their head; non-ASCII bytes become '?'.
            let ch = if byte.is_ascii() { char::from(byte) } else { '?' };
            let _ = line.push(ch);
        }
    }
}
