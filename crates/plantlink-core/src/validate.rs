//! Per-field validation and normalization of frame values.

use crate::frame::RawFrame;

/// Soil counts are inverted against this scale.
pub const SOIL_SCALE: i32 = 100;
/// Light counts are inverted against this scale.
pub const LIGHT_SCALE: i32 = 1_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Soil,
    Light,
    Pump,
}

impl FieldKind {
    /// Order in which value lines follow a marker.
    pub const ALL: [FieldKind; 3] = [FieldKind::Soil, FieldKind::Light, FieldKind::Pump];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Soil => "soil_moisture",
            Self::Light => "light",
            Self::Pump => "pump",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rejection {
    Empty,
    /// No leading integer, or one outside `i32`.
    NotNumeric,
    /// Soil or light count `<= 0`.
    NonPositive,
    /// Pump state `< 0`.
    Negative,
}

impl Rejection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::NotNumeric => "not numeric",
            Self::NonPositive => "non-positive",
            Self::Negative => "negative",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidatedReading {
    Valid(i32),
    Rejected(Rejection),
}

impl ValidatedReading {
    pub const fn value(self) -> Option<i32> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl From<Result<i32, Rejection>> for ValidatedReading {
    fn from(result: Result<i32, Rejection>) -> Self {
        match result {
            Ok(value) => Self::Valid(value),
            Err(reason) => Self::Rejected(reason),
        }
    }
}

pub fn validate(kind: FieldKind, raw: &str) -> ValidatedReading {
    match kind {
        FieldKind::Soil => validate_soil(raw),
        FieldKind::Light => validate_light(raw),
        FieldKind::Pump => validate_pump(raw),
    }
}

/// Valid iff `raw` holds an integer `> 0`; normalized as `100 - raw`.
pub fn validate_soil(raw: &str) -> ValidatedReading {
    positive_count(raw).map(|count| SOIL_SCALE - count).into()
}

/// Valid iff `raw` holds an integer `> 0`; normalized as `1000 - raw`.
pub fn validate_light(raw: &str) -> ValidatedReading {
    positive_count(raw).map(|count| LIGHT_SCALE - count).into()
}

/// Valid iff `raw` holds an integer `>= 0`; passed through unchanged.
pub fn validate_pump(raw: &str) -> ValidatedReading {
    let result = parse_field(raw).and_then(|state| {
        if state < 0 {
            Err(Rejection::Negative)
        } else {
            Ok(state)
        }
    });
    result.into()
}

fn positive_count(raw: &str) -> Result<i32, Rejection> {
    let count = parse_field(raw)?;
    if count <= 0 {
        return Err(Rejection::NonPositive);
    }
    Ok(count)
}

fn parse_field(raw: &str) -> Result<i32, Rejection> {
    if raw.is_empty() {
        return Err(Rejection::Empty);
    }
    parse_leading_int(raw).ok_or(Rejection::NotNumeric)
}

/// Parses an optionally signed decimal prefix, ignoring whatever follows
/// the last digit (`"12abc"` is 12).
pub fn parse_leading_int(raw: &str) -> Option<i32> {
    let bytes = raw.trim_start().as_bytes();
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let mut value = 0i32;
    let mut seen_digit = false;
    for &byte in digits.iter().take_while(|byte| byte.is_ascii_digit()) {
        seen_digit = true;
        let digit = i32::from(byte - b'0');
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
    }

    seen_digit.then_some(value)
}

/// Outcome of every field of one frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidatedFrame {
    pub soil: ValidatedReading,
    pub light: ValidatedReading,
    pub pump: ValidatedReading,
}

impl ValidatedFrame {
    pub fn from_raw(raw: &RawFrame) -> Self {
        Self {
            soil: validate_soil(&raw.soil),
            light: validate_light(&raw.light),
            pump: validate_pump(&raw.pump),
        }
    }

    pub const fn get(&self, kind: FieldKind) -> ValidatedReading {
        match kind {
            FieldKind::Soil => self.soil,
            FieldKind::Light => self.light,
            FieldKind::Pump => self.pump,
        }
    }

    pub fn any_valid(&self) -> bool {
        FieldKind::ALL.iter().any(|kind| self.get(*kind).is_valid())
    }

    pub fn pump_on(&self) -> Option<bool> {
        self.pump.value().map(|state| state != 0)
    }
}
