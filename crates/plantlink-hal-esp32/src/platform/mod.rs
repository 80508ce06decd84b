pub mod lcd;
pub mod strip;

use embedded_hal::digital::OutputPin;
use log::warn;
use plantlink_core::device::BusyIndicator;

/// On-board LED driven high while a cycle runs.
#[derive(Debug)]
pub struct BusyLed<P> {
    pin: P,
}

impl<P: OutputPin> BusyLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: OutputPin> BusyIndicator for BusyLed<P> {
    fn set_busy(&mut self, busy: bool) {
        let result = if busy {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(err) = result {
            warn!("busy led: write failed: {:?}", err);
        }
    }
}
