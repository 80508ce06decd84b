//! DHT11 as the gateway's ambient sensor.

use dht_sensor::dht11;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::warn;
use plantlink_core::device::{AmbientReading, AmbientSensor};

/// Owns the open-drain data line and the busy-wait delay the read needs.
pub struct DhtAmbient<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> DhtAmbient<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Releases the line high so the first read starts from idle.
    pub fn new(mut pin: P, delay: D) -> Result<Self, P::Error> {
        pin.set_high()?;
        Ok(Self { pin, delay })
    }
}

impl<P, D> AmbientSensor for DhtAmbient<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn read(&mut self) -> AmbientReading {
        if let Err(err) = self.pin.set_high() {
            warn!("dht11: releasing line failed: {:?}", err);
            return AmbientReading::failed();
        }

        match dht11::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => AmbientReading::new(
                f32::from(reading.temperature),
                f32::from(reading.relative_humidity),
            ),
            Err(err) => {
                warn!("dht11: read failed: {:?}", err);
                AmbientReading::failed()
            }
        }
    }
}
