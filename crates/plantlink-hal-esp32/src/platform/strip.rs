//! WS2812 strip clocked out through an SPI MOSI line.
//!
//! At 2.4 MHz one SPI bit lasts ~417 ns, so every strip bit becomes three
//! SPI bits: `100` for a zero and `110` for a one.

use embedded_hal::spi::SpiBus;
use heapless::Vec;
use plantlink_core::device::{IndicatorStrip, Rgb};

pub const SPI_HZ: u32 = 2_400_000;
/// SPI bytes per color byte.
const BYTES_PER_CHANNEL: usize = 3;
const BYTES_PER_PIXEL: usize = 3 * BYTES_PER_CHANNEL;
/// Low time latching the strip, >280 us at [`SPI_HZ`].
const RESET_BYTES: usize = 90;
pub const BUFFER_BYTES: usize = 1024;
pub const MAX_PIXELS: usize = (BUFFER_BYTES - RESET_BYTES) / BYTES_PER_PIXEL;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColorOrder {
    Rgb,
    Grb,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StripError<SpiErr> {
    Spi(SpiErr),
    /// More pixels than the transfer buffer holds.
    TooManyPixels,
}

#[derive(Debug)]
pub struct SpiStrip<SPI> {
    spi: SPI,
    pixels: usize,
    order: ColorOrder,
    brightness: u8,
    color: Rgb,
    buffer: Vec<u8, BUFFER_BYTES>,
}

impl<SPI: SpiBus<u8>> SpiStrip<SPI> {
    pub fn new(
        spi: SPI,
        pixels: usize,
        order: ColorOrder,
        brightness: u8,
    ) -> Result<Self, StripError<SPI::Error>> {
        if pixels > MAX_PIXELS {
            return Err(StripError::TooManyPixels);
        }
        Ok(Self {
            spi,
            pixels,
            order,
            brightness,
            color: Rgb::OFF,
            buffer: Vec::new(),
        })
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn encode(&mut self) {
        self.buffer.clear();
        let Rgb { r, g, b } = self.color;
        let channels = match self.order {
            ColorOrder::Rgb => [r, g, b],
            ColorOrder::Grb => [g, r, b],
        }
        .map(|value| scale(value, self.brightness));

        for _ in 0..self.pixels {
            for channel in channels {
                // Capacity checked against MAX_PIXELS in `new`.
                let _ = self.buffer.extend_from_slice(&encode_channel(channel));
            }
        }
        for _ in 0..RESET_BYTES {
            let _ = self.buffer.push(0);
        }
    }
}

impl<SPI: SpiBus<u8>> IndicatorStrip for SpiStrip<SPI> {
    type Error = StripError<SPI::Error>;

    fn fill(&mut self, color: Rgb) {
        self.color = color;
    }

    fn show(&mut self) -> Result<(), Self::Error> {
        self.encode();
        self.spi.write(&self.buffer).map_err(StripError::Spi)?;
        self.spi.flush().map_err(StripError::Spi)
    }
}

/// Global brightness, 255 meaning full scale.
fn scale(value: u8, brightness: u8) -> u8 {
    ((u16::from(value) * (u16::from(brightness) + 1)) >> 8) as u8
}

/// Expands one color byte, MSB first, into 24 SPI bits.
fn encode_channel(value: u8) -> [u8; BYTES_PER_CHANNEL] {
    let mut bits = 0u32;
    for index in (0..8).rev() {
        let pattern = if value >> index & 1 == 1 { 0b110 } else { 0b100 };
        bits = (bits << 3) | pattern;
    }
    let bytes = bits.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}
