//! The gated publish cycle.
//!
//! [`Gateway::tick`] is called as often as the board likes. Every tick
//! services the sinks; at most one tick per poll interval also runs a
//! full cycle: ambient read, serial drain, validation and fan-out.


use log::{info, warn};

use crate::{
    clock::WallClock,
    config::GatewayConfig,
    device::{AmbientReading, AmbientSensor, BusyIndicator},
    frame::{DrainEnd, FrameReader, LineSource, RawFrame, ReaderStats},
    publish::TelemetrySink,
    schedule::PollScheduler,
    validate::{FieldKind, ValidatedFrame, ValidatedReading},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickResult {
    /// Gate closed; only the sinks were serviced.
    Idle,
    CycleRan { frames: u32 },
}

pub struct Gateway<L, A, C, B, P> {
    lines: L,
    ambient: A,
    clock: C,
    busy: B,
    sink: P,
    reader: FrameReader,
    scheduler: PollScheduler,
    max_frames: u32,
}

impl<L, A, C, B, P> Gateway<L, A, C, B, P>
where
    L: LineSource,
    A: AmbientSensor,
    C: WallClock,
    B: BusyIndicator,
    P: TelemetrySink,
{
    pub fn new(lines: L, ambient: A, clock: C, busy: B, sink: P, config: &GatewayConfig) -> Self {
        Self {
            lines,
            ambient,
            clock,
            busy,
            sink,
            reader: FrameReader::new(),
            scheduler: PollScheduler::new(config.poll_interval_ms()),
            max_frames: config.max_frames_per_cycle(),
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> TickResult {
        self.sink.service();

        if !self.scheduler.poll(now_ms) {
            return TickResult::Idle;
        }

        TickResult::CycleRan {
            frames: self.run_cycle(),
        }
    }

    /// Runs one cycle regardless of the gate; returns the frames published.
    pub fn run_cycle(&mut self) -> u32 {
        self.busy.set_busy(true);

        let ambient = self.ambient.read();
        log_ambient(&ambient);
        self.sink.begin_cycle(&ambient);

        let epoch_secs = self.clock.epoch_secs().unwrap_or_else(|| {
            warn!("clock: not synchronized, publishing with epoch 0");
            0
        });

        let sink = &mut self.sink;
        let mut frames = 0u32;
        let end = self.reader.drain_up_to(&mut self.lines, self.max_frames, |raw| {
            let frame = ValidatedFrame::from_raw(raw);
            log_frame(raw, &frame);
            sink.publish_frame(epoch_secs, &frame);
            frames = frames.saturating_add(1);
        });
        match end {
            DrainEnd::Abandoned(missing) => {
                info!("frame: resync on next marker ({} missing)", missing.label())
            }
            DrainEnd::FrameLimit => {
                info!("frame: {} frames this cycle, rest stays buffered", frames)
            }
            DrainEnd::Idle | DrainEnd::KeyReadFailed => {}
        }

        self.sink.publish_ambient(epoch_secs, &ambient);
        self.busy.set_busy(false);

        frames
    }

    pub fn reader_stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }
}

fn log_ambient(ambient: &AmbientReading) {
    match ambient.temperature_c {
        Some(value) => info!("ambient: temperature={}", value as i32),
        None => warn!("ambient: temperature read failed"),
    }
    match ambient.humidity_pct {
        Some(value) => info!("ambient: humidity={}", value as i32),
        None => warn!("ambient: humidity read failed"),
    }
}

fn log_frame(raw: &RawFrame, frame: &ValidatedFrame) {
    for kind in FieldKind::ALL {
        match frame.get(kind) {
            ValidatedReading::Valid(value) => info!("frame: {}={}", kind.label(), value),
            ValidatedReading::Rejected(reason) => warn!(
                "frame: invalid {} data '{}' ({})",
                kind.label(),
                raw.field(kind),
                reason.as_str()
            ),
        }
    }
}
