//! Runtime settings for the gateway loop.

use crate::{device::Rgb, schedule::DEFAULT_POLL_INTERVAL_MS};

pub const DEFAULT_DEVICE_ROOT: &str = "ESP32-Gateway1";
pub const DEFAULT_PLANT: &str = "plant1";
/// Normalized light below this lights the strip.
pub const DEFAULT_LIGHT_THRESHOLD: i32 = 500;
pub const DEFAULT_STRIP_ON_COLOR: Rgb = Rgb::from_u24(0x005998);
pub const DEFAULT_AMBIENT_DECIMALS: u8 = 2;
/// Frames published per cycle; later frames wait for the next cycle.
pub const DEFAULT_MAX_FRAMES_PER_CYCLE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GatewayConfig {
    pub(crate) poll_interval_ms: u64,
    pub(crate) device_root: &'static str,
    pub(crate) plant: &'static str,
    pub(crate) light_threshold: i32,
    pub(crate) strip_on_color: Rgb,
    pub(crate) ambient_decimals: u8,
    pub(crate) max_frames_per_cycle: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl GatewayConfig {
    pub const DEFAULT: Self = Self {
        poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        device_root: DEFAULT_DEVICE_ROOT,
        plant: DEFAULT_PLANT,
        light_threshold: DEFAULT_LIGHT_THRESHOLD,
        strip_on_color: DEFAULT_STRIP_ON_COLOR,
        ambient_decimals: DEFAULT_AMBIENT_DECIMALS,
        max_frames_per_cycle: DEFAULT_MAX_FRAMES_PER_CYCLE,
    };

    pub const fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Top-level key under which the gateway writes.
    pub const fn with_device_root(mut self, device_root: &'static str) -> Self {
        self.device_root = device_root;
        self
    }

    pub const fn with_plant(mut self, plant: &'static str) -> Self {
        self.plant = plant;
        self
    }

    pub const fn with_light_threshold(mut self, light_threshold: i32) -> Self {
        self.light_threshold = light_threshold;
        self
    }

    pub const fn with_strip_on_color(mut self, strip_on_color: Rgb) -> Self {
        self.strip_on_color = strip_on_color;
        self
    }

    pub const fn with_ambient_decimals(mut self, ambient_decimals: u8) -> Self {
        self.ambient_decimals = ambient_decimals;
        self
    }

    pub const fn with_max_frames_per_cycle(mut self, max_frames_per_cycle: u32) -> Self {
        self.max_frames_per_cycle = max_frames_per_cycle;
        self
    }

    pub const fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub const fn device_root(&self) -> &'static str {
        self.device_root
    }

    pub const fn plant(&self) -> &'static str {
        self.plant
    }

    pub const fn max_frames_per_cycle(&self) -> u32 {
        self.max_frames_per_cycle
    }
}
