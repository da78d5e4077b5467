//! Moisture probe on ADC1 (GPIO34).

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO34};
use soilmon_core::sensors::{RawAdc, SensorError};

/// Oneshot conversions on the probe channel.
///
/// 11 dB attenuation gives the full 0 - 3.3 V input range, so the 12-bit
/// result spans the whole probe output.
pub struct ProbeAdc<'d> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<GPIO34<'d>, ADC1<'d>>,
}

impl<'d> ProbeAdc<'d> {
    pub fn new(adc1: ADC1<'d>, gpio: GPIO34<'d>) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(gpio, Attenuation::_11dB);
        let adc = Adc::new(adc1, config);
        Self { adc, pin }
    }
}

impl RawAdc for ProbeAdc<'_> {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        loop {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(raw) => return Ok(raw),
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(_)) => {
                    return Err(SensorError::ReadFailed {
                        sensor: "moisture probe",
                        operation: "adc oneshot",
                    });
                }
            }
        }
    }
}
