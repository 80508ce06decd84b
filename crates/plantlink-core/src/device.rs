//! Device capabilities the control loop drives.

use core::fmt::{self, Debug};

use heapless::String;

use crate::publish::batch::{KvValue, SheetRow};

pub const SINK_REASON_BYTES: usize = 64;

/// Primary temperature/humidity sensor reading; `None` marks a failed read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AmbientReading {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
}

impl AmbientReading {
    pub const fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c: Some(temperature_c),
            humidity_pct: Some(humidity_pct),
        }
    }

    pub const fn failed() -> Self {
        Self {
            temperature_c: None,
            humidity_pct: None,
        }
    }
}

pub trait AmbientSensor {
    fn read(&mut self) -> AmbientReading;
}

/// On-board LED lit while a publish cycle runs.
pub trait BusyIndicator {
    fn set_busy(&mut self, busy: bool);
}

/// Two-line character display.
pub trait TextDisplay {
    type Error: Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// From a packed `0xRRGGBB` value.
    pub const fn from_u24(packed: u32) -> Self {
        Self::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }
}

/// Addressable strip; changes stay buffered until [`IndicatorStrip::show`].
pub trait IndicatorStrip {
    type Error: Debug;

    fn fill(&mut self, color: Rgb);
    fn show(&mut self) -> Result<(), Self::Error>;
}

/// Failure reported by a cloud sink, with the sink's own reason text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SinkError {
    code: i32,
    reason: String<SINK_REASON_BYTES>,
}

impl SinkError {
    /// Builds an error, truncating `reason` to fit.
    pub fn new(code: i32, reason: &str) -> Self {
        let mut text = String::new();
        for ch in reason.chars() {
            if text.push(ch).is_err() {
                break;
            }
        }
        Self { code, reason: text }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.reason, self.code)
    }
}

/// Realtime key-value store addressed by slash-separated paths.
pub trait KeyValueSink {
    fn set(&mut self, path: &str, value: KvValue) -> Result<(), SinkError>;

    /// Non-blocking bookkeeping; called on every control-loop tick.
    fn service(&mut self) {}
}

/// Append-only spreadsheet.
pub trait SheetSink {
    fn append(&mut self, range: &str, row: &SheetRow) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_colors_unpack_in_rgb_order() {
        assert_eq!(Rgb::from_u24(0x005998), Rgb::new(0x00, 0x59, 0x98));
        assert_eq!(Rgb::from_u24(0x000000), Rgb::OFF);
    }

    #[test]
    fn long_sink_reasons_are_truncated() {
        let long = "x".repeat(200);
        let err = SinkError::new(401, &long);
        assert_eq!(err.reason().len(), SINK_REASON_BYTES);
        assert_eq!(err.code(), 401);
    }
}
