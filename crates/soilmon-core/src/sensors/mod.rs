mod calibration;

pub use calibration::Calibration;

use crate::config::ADC_MAX;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// One moisture sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Calibrated moisture, 0 (dry) ..= 100 (wet).
    pub moisture_percent: u8,
    /// Unscaled ADC count, 0 ..= 4095.
    pub raw_adc: u16,
}

/// A single-channel analog-to-digital converter.
///
/// Implemented by the firmware for the ESP32 ADC1 oneshot driver and by the
/// simulator for a synthetic signal.
pub trait RawAdc {
    /// Take one conversion.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Moisture probe: a raw ADC channel plus its calibration.
pub struct MoistureSensor<A> {
    adc: A,
    calibration: Calibration,
}

impl<A: RawAdc> MoistureSensor<A> {
    pub const fn new(adc: A, calibration: Calibration) -> Self {
        Self { adc, calibration }
    }

    /// Read the probe and map the raw value to a percentage.
    pub fn read(&mut self) -> Result<Reading, SensorError> {
        let raw_adc = self.adc.read_raw()?.min(ADC_MAX);
        Ok(Reading {
            moisture_percent: self.calibration.percent(raw_adc),
            raw_adc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeAdc;

    #[test]
    fn test_read_maps_raw() {
        let mut sensor = MoistureSensor::new(FakeAdc::new(&[0, 4095]), Calibration::new(4095, 0));

        let wet = sensor.read().unwrap();
        assert_eq!(wet.raw_adc, 0);
        assert_eq!(wet.moisture_percent, 100);

        let dry = sensor.read().unwrap();
        assert_eq!(dry.raw_adc, 4095);
        assert_eq!(dry.moisture_percent, 0);
    }

    #[test]
    fn test_read_clamps_to_12_bits() {
        let mut sensor = MoistureSensor::new(FakeAdc::new(&[9000]), Calibration::new(4095, 0));
        let reading = sensor.read().unwrap();
        assert_eq!(reading.raw_adc, 4095);
        assert_eq!(reading.moisture_percent, 0);
    }

    #[test]
    fn test_read_propagates_adc_error() {
        let mut sensor = MoistureSensor::new(FakeAdc::failing(), Calibration::new(4095, 0));
        assert!(matches!(
            sensor.read(),
            Err(SensorError::ReadFailed { .. })
        ));
    }
}
