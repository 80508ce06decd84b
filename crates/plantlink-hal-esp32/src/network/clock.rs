//! SNTP-anchored wall clock readable from the control loop.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use esp_hal::time::Instant;
use plantlink_core::clock::{EpochAnchor, WallClock};

/// Latest SNTP anchor, written by the sync worker.
#[derive(Debug)]
pub struct ClockHandle {
    synced: AtomicBool,
    epoch_secs: AtomicU32,
    uptime_secs: AtomicU32,
}

impl ClockHandle {
    pub const fn new() -> Self {
        Self {
            synced: AtomicBool::new(false),
            epoch_secs: AtomicU32::new(0),
            uptime_secs: AtomicU32::new(0),
        }
    }

    /// Records that `epoch_secs` was current at `uptime_ms`.
    pub fn anchor(&self, epoch_secs: u64, uptime_ms: u64) {
        let epoch = u32::try_from(epoch_secs).unwrap_or(u32::MAX);
        let uptime = u32::try_from(uptime_ms / 1_000).unwrap_or(u32::MAX);
        self.synced.store(false, Ordering::Release);
        self.epoch_secs.store(epoch, Ordering::Release);
        self.uptime_secs.store(uptime, Ordering::Release);
        self.synced.store(true, Ordering::Release);
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Unix seconds at `uptime_ms`, once synced.
    pub fn epoch_at(&self, uptime_ms: u64) -> Option<u64> {
        if !self.is_synced() {
            return None;
        }
        let anchor = EpochAnchor::new(
            u64::from(self.epoch_secs.load(Ordering::Acquire)),
            u64::from(self.uptime_secs.load(Ordering::Acquire)) * 1_000,
        );
        Some(anchor.epoch_at(uptime_ms))
    }
}

impl Default for ClockHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// [`WallClock`] over a shared [`ClockHandle`] and the system timer.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    handle: &'static ClockHandle,
    boot: Instant,
}

impl SystemClock {
    pub fn new(handle: &'static ClockHandle, boot: Instant) -> Self {
        Self { handle, boot }
    }
}

impl WallClock for SystemClock {
    fn epoch_secs(&mut self) -> Option<u64> {
        self.handle.epoch_at(self.boot.elapsed().as_millis())
    }
}
