//! Fan-out of validated readings to the cloud sinks and local outputs.

pub mod batch;
pub mod wire;

#[cfg(test)]
mod tests;

use core::fmt::Write;

use heapless::String;
use log::{debug, warn};

use crate::{
    config::GatewayConfig,
    device::{
        AmbientReading, IndicatorStrip, KeyValueSink, Rgb, SheetSink, SinkError, TextDisplay,
    },
    observer::TelemetryObserver,
    validate::{ValidatedFrame, ValidatedReading},
};

pub use batch::{CellValue, KvValue, PublishBatch, SheetRow};

/// Holds either line with two full-width `i32` values.
pub const DISPLAY_LINE_BYTES: usize = 40;
pub type DisplayLine = String<DISPLAY_LINE_BYTES>;

const KV_TASK: &str = "rtdb";
const SHEET_TASK: &str = "sheets";
const AMBIENT_ROW: u8 = 0;
const FRAME_ROW: u8 = 1;
const MISSING: &str = "--";

/// Sink calls one frame can cost: each key write plus the row.
pub const FRAME_SINK_CALLS: usize = batch::MAX_KV_WRITES + 1;
/// Sink calls of the ambient half of a cycle.
pub const AMBIENT_SINK_CALLS: usize = batch::AMBIENT_KV_WRITES + 1;

/// Worst-case sink calls of one cycle publishing up to `max_frames` frames.
pub const fn cycle_sink_calls(max_frames: u32) -> usize {
    max_frames as usize * FRAME_SINK_CALLS + AMBIENT_SINK_CALLS
}

/// Receives the events of one publish cycle, in call order.
pub trait TelemetrySink {
    /// Opens a cycle with the fresh ambient reading.
    fn begin_cycle(&mut self, ambient: &AmbientReading);

    fn publish_frame(&mut self, epoch_secs: u64, frame: &ValidatedFrame);

    /// Closes the cycle; ambient values go out even when the read failed.
    fn publish_ambient(&mut self, epoch_secs: u64, ambient: &AmbientReading);

    /// Called on every control-loop tick, cycle or not.
    fn service(&mut self);
}

pub struct Publisher<K, S, D, X, O> {
    kv: K,
    sheet: S,
    display: D,
    strip: X,
    observer: O,
    config: GatewayConfig,
    display_fault_logged: bool,
    strip_fault_logged: bool,
}

impl<K, S, D, X, O> Publisher<K, S, D, X, O>
where
    K: KeyValueSink,
    S: SheetSink,
    D: TextDisplay,
    X: IndicatorStrip,
    O: TelemetryObserver,
{
    pub fn new(kv: K, sheet: S, display: D, strip: X, observer: O, config: GatewayConfig) -> Self {
        Self {
            kv,
            sheet,
            display,
            strip,
            observer,
            config,
            display_fault_logged: false,
            strip_fault_logged: false,
        }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn sheet(&self) -> &S {
        &self.sheet
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn strip(&self) -> &X {
        &self.strip
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Sends every key write of `batch`; one failure does not stop the rest.
    fn send_writes(&mut self, batch: &PublishBatch) {
        for (path, value) in batch.writes() {
            if let Err(err) = self.kv.set(path, *value) {
                self.report(KV_TASK, &err);
            }
        }
    }

    fn send_row(&mut self, batch: &PublishBatch) {
        if let Err(err) = self.sheet.append(batch.range(), batch.row()) {
            self.report(SHEET_TASK, &err);
        }
    }

    fn report(&mut self, task: &str, err: &SinkError) {
        self.observer.on_error(task, err.reason(), err.code());
    }

    fn show_line(&mut self, row: u8, text: &str) {
        if let Err(err) = self.display.write_line(row, text) {
            self.display_fault(err);
        }
    }

    fn display_fault(&mut self, err: D::Error) {
        if !self.display_fault_logged {
            warn!("display: write failed: {:?}", err);
            self.display_fault_logged = true;
        }
    }

    fn update_strip(&mut self, light: i32) {
        self.strip.fill(strip_color(&self.config, light));
        if let Err(err) = self.strip.show() {
            if !self.strip_fault_logged {
                warn!("strip: show failed: {:?}", err);
                self.strip_fault_logged = true;
            }
        }
    }
}

impl<K, S, D, X, O> TelemetrySink for Publisher<K, S, D, X, O>
where
    K: KeyValueSink,
    S: SheetSink,
    D: TextDisplay,
    X: IndicatorStrip,
    O: TelemetryObserver,
{
    fn begin_cycle(&mut self, ambient: &AmbientReading) {
        if let Err(err) = self.display.clear() {
            self.display_fault(err);
        }
        self.show_line(AMBIENT_ROW, &ambient_line(ambient));
    }

    fn publish_frame(&mut self, epoch_secs: u64, frame: &ValidatedFrame) {
        let batch = PublishBatch::for_frame(&self.config, epoch_secs, frame);
        self.send_writes(&batch);

        if let Some(light) = frame.light.value() {
            self.update_strip(light);
        }
        self.show_line(FRAME_ROW, &frame_line(frame));

        if batch.has_readings() {
            self.send_row(&batch);
        } else {
            debug!("publish: frame row skipped, no valid field");
        }
    }

    fn publish_ambient(&mut self, epoch_secs: u64, ambient: &AmbientReading) {
        let batch = PublishBatch::for_ambient(&self.config, epoch_secs, ambient);
        self.send_writes(&batch);
        self.send_row(&batch);
    }

    fn service(&mut self) {
        self.kv.service();
    }
}

/// Strip color for a normalized light value.
pub fn strip_color(config: &GatewayConfig, light: i32) -> Rgb {
    if light < config.light_threshold {
        config.strip_on_color
    } else {
        Rgb::OFF
    }
}

/// `Temp:<t> Humi:<h>`, whole units, `--` for a failed read.
pub fn ambient_line(ambient: &AmbientReading) -> DisplayLine {
    let mut line = DisplayLine::new();
    let _ = line.push_str("Temp:");
    push_whole(&mut line, ambient.temperature_c);
    let _ = line.push_str(" Humi:");
    push_whole(&mut line, ambient.humidity_pct);
    line
}

/// `soil:<s> LDR:<l>`, `--` for a rejected field.
pub fn frame_line(frame: &ValidatedFrame) -> DisplayLine {
    let mut line = DisplayLine::new();
    let _ = line.push_str("soil:");
    push_reading(&mut line, frame.soil);
    let _ = line.push_str(" LDR:");
    push_reading(&mut line, frame.light);
    line
}

fn push_whole(line: &mut DisplayLine, value: Option<f32>) {
    match value {
        // Truncates toward zero.
        Some(value) => {
            let _ = write!(line, "{}", value as i32);
        }
        None => {
            let _ = line.push_str(MISSING);
        }
    }
}

fn push_reading(line: &mut DisplayLine, reading: ValidatedReading) {
    match reading.value() {
        Some(value) => {
            let _ = write!(line, "{}", value);
        }
        None => {
            let _ = line.push_str(MISSING);
        }
    }
}
