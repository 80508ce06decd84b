//! Queues between the synchronous control loop and the async uploader.
//!
//! Sinks encode their payload up front and hand it over with `try_send`;
//! a full queue is reported as a sink failure and the write is dropped.
//! Upload results flow back through a second queue and reach the observer
//! when the key-value sink is serviced.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use log::warn;
use plantlink_core::{
    config::GatewayConfig,
    device::{KeyValueSink, SheetSink, SinkError},
    observer::TelemetryObserver,
    publish::{
        self, KvValue, SheetRow,
        batch::{KvPath, SheetRange},
        wire::{self, KvBody, RowBody},
    },
};

/// Room for every write of one full cycle under the default config.
pub const REQUEST_DEPTH: usize =
    publish::cycle_sink_calls(GatewayConfig::DEFAULT.max_frames_per_cycle());
pub const OUTCOME_DEPTH: usize = REQUEST_DEPTH;

pub const KV_TASK: &str = "rtdb";
pub const SHEET_TASK: &str = "sheets";

pub const ENCODE_FAILED: i32 = -1;
pub const OUTBOX_FULL: i32 = -2;
pub const OFFLINE: i32 = -3;
pub const TRANSPORT_FAILED: i32 = -4;

pub type RequestChannel = Channel<CriticalSectionRawMutex, CloudRequest, REQUEST_DEPTH>;
pub type OutcomeChannel = Channel<CriticalSectionRawMutex, CloudOutcome, OUTCOME_DEPTH>;

#[derive(Clone, Debug)]
pub enum CloudRequest {
    /// Realtime DB write of `body` at `path`.
    Put { path: KvPath, body: KvBody },
    /// Spreadsheet append of `body` under `range`.
    Append { range: SheetRange, body: RowBody },
}

impl CloudRequest {
    pub fn task(&self) -> &'static str {
        match self {
            Self::Put { .. } => KV_TASK,
            Self::Append { .. } => SHEET_TASK,
        }
    }

    /// Key path or sheet range the request targets.
    pub fn target(&self) -> &str {
        match self {
            Self::Put { path, .. } => path,
            Self::Append { range, .. } => range,
        }
    }
}

#[derive(Clone, Debug)]
pub enum CloudOutcome {
    Done { task: &'static str, status: u16 },
    Failed { task: &'static str, error: SinkError },
}

/// [`KeyValueSink`] feeding the uploader; also drains its results.
pub struct KvOutbox<O> {
    requests: &'static RequestChannel,
    outcomes: &'static OutcomeChannel,
    observer: O,
}

impl<O: TelemetryObserver> KvOutbox<O> {
    pub fn new(
        requests: &'static RequestChannel,
        outcomes: &'static OutcomeChannel,
        observer: O,
    ) -> Self {
        Self {
            requests,
            outcomes,
            observer,
        }
    }
}

impl<O: TelemetryObserver> KeyValueSink for KvOutbox<O> {
    fn set(&mut self, path: &str, value: KvValue) -> Result<(), SinkError> {
        let body = wire::kv_body(value).map_err(|_| SinkError::new(ENCODE_FAILED, "encode failed"))?;
        let mut target = KvPath::new();
        target
            .push_str(path)
            .map_err(|_| SinkError::new(ENCODE_FAILED, "path too long"))?;

        enqueue(self.requests, CloudRequest::Put { path: target, body })?;
        self.observer.on_debug(KV_TASK, path);
        Ok(())
    }

    fn service(&mut self) {
        while let Ok(outcome) = self.outcomes.try_receive() {
            match outcome {
                CloudOutcome::Done { task, status } => {
                    self.observer.on_event(task, "upload ok", i32::from(status))
                }
                CloudOutcome::Failed { task, error } => {
                    self.observer.on_error(task, error.reason(), error.code())
                }
            }
        }
    }
}

/// [`SheetSink`] feeding the uploader.
pub struct SheetOutbox {
    requests: &'static RequestChannel,
}

impl SheetOutbox {
    pub fn new(requests: &'static RequestChannel) -> Self {
        Self { requests }
    }
}

impl SheetSink for SheetOutbox {
    fn append(&mut self, range: &str, row: &SheetRow) -> Result<(), SinkError> {
        let body = wire::row_body(row).map_err(|_| SinkError::new(ENCODE_FAILED, "encode failed"))?;
        let mut target = SheetRange::new();
        target
            .push_str(range)
            .map_err(|_| SinkError::new(ENCODE_FAILED, "range too long"))?;

        enqueue(self.requests, CloudRequest::Append { range: target, body })
    }
}

/// Hands a finished upload back to the control loop.
pub fn report(outcomes: &OutcomeChannel, outcome: CloudOutcome) {
    if outcomes.try_send(outcome).is_err() {
        warn!("cloud: outcome queue full, result dropped");
    }
}

fn enqueue(requests: &RequestChannel, request: CloudRequest) -> Result<(), SinkError> {
    requests.try_send(request).map_err(|_| {
        warn!("cloud: outbox full, write dropped");
        SinkError::new(OUTBOX_FULL, "outbox full")
    })
}
