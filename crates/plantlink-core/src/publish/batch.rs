//! What one logical event sends to the cloud: key-value writes plus one
//! spreadsheet row.
//!
//! Only validated fields appear. A rejected field leaves no key write and
//! an empty spreadsheet column, never a placeholder value.

use core::fmt::Write;

use heapless::{String, Vec};
use log::warn;

use crate::{
    config::GatewayConfig,
    device::AmbientReading,
    validate::{FieldKind, ValidatedFrame},
};

pub const PATH_BYTES: usize = 64;
pub const RANGE_BYTES: usize = 40;
pub const MAX_KV_WRITES: usize = 4;
/// Key writes of an ambient batch: timestamp, temperature, humidity.
pub const AMBIENT_KV_WRITES: usize = 3;
pub const MAX_COLUMNS: usize = 4;
/// Appends start searching for the table at this cell.
pub const SHEET_ANCHOR_CELL: &str = "A2";

const TIMESTAMP_KEY: &str = "timestamp";
const TEMPERATURE_KEY: &str = "temperature";
const HUMIDITY_KEY: &str = "humidity";

pub type KvPath = String<PATH_BYTES>;
pub type SheetRange = String<RANGE_BYTES>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KvValue {
    Int(i32),
    Bool(bool),
    /// Float rendered with a fixed number of decimals.
    Number { value: f32, decimals: u8 },
    /// Placeholder the server replaces with its own write time.
    ServerTimestamp,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CellValue {
    Int(i64),
    Number { value: f32, decimals: u8 },
}

/// One spreadsheet row in column-major form; `None` columns stay empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetRow {
    columns: Vec<Option<CellValue>, MAX_COLUMNS>,
}

impl SheetRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Option<CellValue>] {
        &self.columns
    }

    pub fn filled(&self) -> usize {
        self.columns.iter().filter(|column| column.is_some()).count()
    }

    fn push(&mut self, cell: Option<CellValue>) {
        if self.columns.push(cell).is_err() {
            warn!("publish: sheet row full, column dropped");
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PublishBatch {
    epoch_secs: u64,
    writes: Vec<(KvPath, KvValue), MAX_KV_WRITES>,
    range: SheetRange,
    row: SheetRow,
}

impl PublishBatch {
    /// Frame fields under `/{root}/{plant}`; row `[timestamp, soil, light, pump]`.
    pub fn for_frame(config: &GatewayConfig, epoch_secs: u64, frame: &ValidatedFrame) -> Self {
        let root = config.device_root;
        let plant = config.plant;
        let mut batch = Self::empty(epoch_secs, config.plant);

        if let Some(soil) = frame.soil.value() {
            batch.write(&[root, plant, FieldKind::Soil.label()], KvValue::Int(soil));
            batch.write(&[root, plant, TIMESTAMP_KEY], KvValue::ServerTimestamp);
        }
        if let Some(light) = frame.light.value() {
            batch.write(&[root, plant, FieldKind::Light.label()], KvValue::Int(light));
        }
        if let Some(on) = frame.pump_on() {
            batch.write(&[root, plant, FieldKind::Pump.label()], KvValue::Bool(on));
        }

        batch.row.push(Some(timestamp_cell(epoch_secs)));
        for kind in FieldKind::ALL {
            let cell = frame
                .get(kind)
                .value()
                .map(|value| CellValue::Int(i64::from(value)));
            batch.row.push(cell);
        }

        batch
    }

    /// Ambient values under `/{root}`; row `[timestamp, temperature, humidity]`.
    pub fn for_ambient(config: &GatewayConfig, epoch_secs: u64, ambient: &AmbientReading) -> Self {
        let root = config.device_root;
        let decimals = config.ambient_decimals;
        let mut batch = Self::empty(epoch_secs, config.device_root);

        batch.write(&[root, TIMESTAMP_KEY], KvValue::ServerTimestamp);
        if let Some(value) = ambient.temperature_c {
            batch.write(&[root, TEMPERATURE_KEY], KvValue::Number { value, decimals });
        }
        if let Some(value) = ambient.humidity_pct {
            batch.write(&[root, HUMIDITY_KEY], KvValue::Number { value, decimals });
        }

        batch.row.push(Some(timestamp_cell(epoch_secs)));
        for reading in [ambient.temperature_c, ambient.humidity_pct] {
            batch
                .row
                .push(reading.map(|value| CellValue::Number { value, decimals }));
        }

        batch
    }

    pub fn epoch_secs(&self) -> u64 {
        self.epoch_secs
    }

    pub fn writes(&self) -> &[(KvPath, KvValue)] {
        &self.writes
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn row(&self) -> &SheetRow {
        &self.row
    }

    /// True when the row holds something besides its timestamp column.
    pub fn has_readings(&self) -> bool {
        self.row.columns().iter().skip(1).any(Option::is_some)
    }

    fn empty(epoch_secs: u64, sheet: &str) -> Self {
        Self {
            epoch_secs,
            writes: Vec::new(),
            range: sheet_range(sheet),
            row: SheetRow::new(),
        }
    }

    fn write(&mut self, segments: &[&str], value: KvValue) {
        if self.writes.push((kv_path(segments), value)).is_err() {
            warn!("publish: too many key writes in one batch");
        }
    }
}

fn timestamp_cell(epoch_secs: u64) -> CellValue {
    CellValue::Int(i64::try_from(epoch_secs).unwrap_or(i64::MAX))
}

/// Joins `segments` into `/a/b/c`.
pub fn kv_path(segments: &[&str]) -> KvPath {
    let mut path = KvPath::new();
    for segment in segments {
        if path.push('/').is_err() || path.push_str(segment).is_err() {
            warn!("publish: key path truncated at segment {}", segment);
            break;
        }
    }
    path
}

/// `{sheet}!A2`.
pub fn sheet_range(sheet: &str) -> SheetRange {
    let mut range = SheetRange::new();
    if write!(range, "{}!{}", sheet, SHEET_ANCHOR_CELL).is_err() {
        warn!("publish: sheet range truncated for {}", sheet);
    }
    range
}
