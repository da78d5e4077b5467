//! Host stand-ins for the device peripherals.

use std::convert::Infallible;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use soilmon_core::config::{ADC_MAX, AP_GATEWAY};
use soilmon_core::connectivity::{WifiDriver, WifiError};
use soilmon_core::operational::Clock;
use soilmon_core::sensors::{RawAdc, SensorError};
use soilmon_core::storage::{Credentials, RecordStorage, StorageError};

use crate::settings::StationOutcome;

// ---------------------------------------------------------------------------
// Credential record
// ---------------------------------------------------------------------------

/// The credential record kept in a plain file.
pub struct FileRecord {
    path: PathBuf,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordStorage for FileRecord {
    fn read_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Reading {} failed: {}", self.path.display(), e);
                return Err(StorageError::Io);
            }
        };

        if data.len() > buf.len() {
            return Err(StorageError::TooLarge {
                len: data.len(),
                capacity: buf.len(),
            });
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(Some(data.len()))
    }

    fn write_record(&mut self, data: &[u8]) -> Result<(), StorageError> {
        std::fs::write(&self.path, data).map_err(|e| {
            warn!("Writing {} failed: {}", self.path.display(), e);
            StorageError::Io
        })
    }
}

// ---------------------------------------------------------------------------
// Moisture probe
// ---------------------------------------------------------------------------

/// Synthetic probe slowly drying out and being watered again.
pub struct SyntheticAdc {
    start: Instant,
}

impl SyntheticAdc {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl RawAdc for SyntheticAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let t = self.start.elapsed().as_secs_f64();
        // 1000..3000 with a ten-minute period, plus a little jitter.
        let raw = 2000.0
            + 1000.0 * (t / 600.0 * std::f64::consts::TAU).sin()
            + 15.0 * (t * 1.7).cos();
        Ok((raw.round() as u16).min(ADC_MAX))
    }
}

// ---------------------------------------------------------------------------
// WiFi
// ---------------------------------------------------------------------------

/// Status polls before a simulated station reports connected.
const SIM_CONNECT_POLLS: usize = 2;

pub struct SimWifi {
    outcome: StationOutcome,
    joining: bool,
    polls: usize,
}

impl SimWifi {
    pub fn new(outcome: StationOutcome) -> Self {
        Self {
            outcome,
            joining: false,
            polls: 0,
        }
    }
}

impl WifiDriver for SimWifi {
    async fn activate_station(&mut self) -> Result<(), WifiError> {
        debug!("Simulated station interface up");
        Ok(())
    }

    fn is_station_connected(&mut self) -> bool {
        if !self.joining {
            return false;
        }
        self.polls += 1;
        self.outcome == StationOutcome::Connects && self.polls >= SIM_CONNECT_POLLS
    }

    async fn connect_station(&mut self, credentials: &Credentials) -> Result<(), WifiError> {
        info!("Simulated join of {:?}", credentials);
        self.joining = true;
        self.polls = 0;
        Ok(())
    }

    fn station_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::LOCALHOST)
    }

    async fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<(), WifiError> {
        info!("Simulated access point {} up", ssid);
        Ok(())
    }

    fn access_point_address(&self) -> Ipv4Addr {
        let [a, b, c, d] = AP_GATEWAY;
        Ipv4Addr::new(a, b, c, d)
    }
}

// ---------------------------------------------------------------------------
// Timing and GPIO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl embedded_hal_async::delay::DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(Duration::from_nanos(u64::from(ns))).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
    }
}

/// The activity LED, rendered as log lines.
#[derive(Debug, Default)]
pub struct LogPin;

impl embedded_hal::digital::ErrorType for LogPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("indicator off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("indicator on");
        Ok(())
    }
}
