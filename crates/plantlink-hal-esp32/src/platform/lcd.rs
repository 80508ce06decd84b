//! 16x2 character LCD behind a PCF8574 I2C backpack.
//!
//! The controller protocol lives in `hd44780-driver`; this adapter only
//! picks the row and pads each line to the panel width.

use embedded_hal::{delay::DelayNs, i2c::I2c};
use hd44780_driver::{
    HD44780,
    bus::I2CBus,
    charset::{CharsetUniversal, EmptyFallback},
    memory_map::MemoryMap1602,
    setup::DisplayOptionsI2C,
};
use heapless::String;
use log::{info, warn};
use plantlink_core::{device::TextDisplay, retry::RetryPolicy};

pub const DEFAULT_ADDRESS: u8 = 0x27;
pub const COLUMNS: usize = 16;
pub const ROWS: u8 = 2;

type Driver<I2C> = HD44780<I2CBus<I2C>, MemoryMap1602, EmptyFallback<CharsetUniversal>>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LcdError {
    /// The backpack never answered at boot.
    Absent,
    Bus,
    /// Row outside the panel.
    InvalidRow,
}

pub struct Lcd1602<I2C: I2c, D> {
    driver: Option<Driver<I2C>>,
    delay: D,
}

impl<I2C, D> Lcd1602<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Waits for the backpack to acknowledge under `ack_retry`, then runs the
    /// controller's 4-bit setup. A panel that never answers stays absent
    /// and every later write reports [`LcdError::Absent`].
    pub fn new(mut i2c: I2C, address: u8, mut delay: D, ack_retry: &RetryPolicy) -> Self {
        if let Err(err) = ack_retry.run(&mut delay, |_| i2c.write(address, &[0])) {
            warn!(
                "lcd: no ack at 0x{:02x} after {} attempts: {:?}",
                address, err.attempts, err.last_error
            );
            return Self {
                driver: None,
                delay,
            };
        }

        let options = DisplayOptionsI2C::new(MemoryMap1602::new()).with_i2c_bus(i2c, address);
        let driver = match HD44780::new(options, &mut delay) {
            Ok(driver) => {
                info!("lcd: ready at 0x{:02x}", address);
                Some(driver)
            }
            Err(_) => {
                warn!("lcd: controller setup failed at 0x{:02x}", address);
                None
            }
        };

        Self { driver, delay }
    }
}

impl<I2C, D> TextDisplay for Lcd1602<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = LcdError;

    fn clear(&mut self) -> Result<(), Self::Error> {
        let driver = self.driver.as_mut().ok_or(LcdError::Absent)?;
        driver.clear(&mut self.delay).map_err(|_| LcdError::Bus)
    }

    /// Writes `text` from column 0, padded with spaces to the panel width.
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error> {
        if row >= ROWS {
            return Err(LcdError::InvalidRow);
        }
        let driver = self.driver.as_mut().ok_or(LcdError::Absent)?;

        driver
            .set_cursor_xy((0, row), &mut self.delay)
            .map_err(|_| LcdError::Bus)?;
        driver
            .write_str(&padded(text), &mut self.delay)
            .map_err(|_| LcdError::Bus)
    }
}

/// First [`COLUMNS`] characters of `text`, non-ASCII as `?`, space padded.
fn padded(text: &str) -> String<COLUMNS> {
    let mut line = String::new();
    for ch in text.chars().take(COLUMNS) {
        let _ = line.push(if ch.is_ascii() { ch } else { '?' });
    }
    while line.push(' ').is_ok() {}
    line
}
