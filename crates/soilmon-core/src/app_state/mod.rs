//! Application-wide state and error types for soilmon

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use thiserror_no_std::Error;

use crate::sensors::{Reading, SensorError};

/// Connectivity phase of the device. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Booted, credentials not yet looked at or none found.
    Unprovisioned,
    /// Station interface up, waiting for the association and an address.
    StationConnecting,
    /// Joined the configured network. Terminal for this boot.
    StationConnected,
    /// Serving the configuration portal from the access point. Left only by
    /// a restart.
    ProvisioningActive,
}

/// Inputs to the connectivity state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    CredentialsFound,
    CredentialsMissing,
    Connected,
    ConnectFailed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

impl ConnectionState {
    /// The transition function of the connectivity state machine.
    ///
    /// ```text
    /// Unprovisioned     --CredentialsFound-->   StationConnecting
    /// Unprovisioned     --CredentialsMissing--> ProvisioningActive
    /// StationConnecting --Connected-->          StationConnected
    /// StationConnecting --ConnectFailed-->      ProvisioningActive
    /// ```
    ///
    /// `StationConnected` and `ProvisioningActive` accept no events.
    pub fn on(self, event: ConnectionEvent) -> Result<Self, InvalidTransition> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Unprovisioned, CredentialsFound) => Ok(StationConnecting),
            (Unprovisioned, CredentialsMissing) => Ok(ProvisioningActive),
            (StationConnecting, Connected) => Ok(StationConnected),
            (StationConnecting, ConnectFailed) => Ok(ProvisioningActive),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::StationConnecting => "station connecting",
            Self::StationConnected => "station connected",
            Self::ProvisioningActive => "provisioning",
        }
    }
}

/// Last-known moisture reading, shared by the sampler and the status server.
///
/// Both run on one task today, so the lock is never contended. The
/// critical-section mutex keeps the snapshot consistent if they are ever
/// split across tasks or interrupt contexts.
pub struct LastReading {
    inner: Mutex<CriticalSectionRawMutex, Cell<Option<Reading>>>,
}

impl LastReading {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(None)),
        }
    }

    pub fn store(&self, reading: Reading) {
        self.inner.lock(|cell| cell.set(Some(reading)));
    }

    /// `None` until the first sample has been taken.
    pub fn snapshot(&self) -> Option<Reading> {
        self.inner.lock(|cell| cell.get())
    }
}

impl Default for LastReading {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Indicator output failed")]
    Indicator,
}

impl From<SensorError> for AppError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionEvent::*;
    use ConnectionState::*;

    #[test]
    fn test_boot_with_credentials() {
        let state = Unprovisioned.on(CredentialsFound).unwrap();
        assert_eq!(state, StationConnecting);
        assert_eq!(state.on(Connected).unwrap(), StationConnected);
    }

    #[test]
    fn test_boot_without_credentials() {
        assert_eq!(Unprovisioned.on(CredentialsMissing).unwrap(), ProvisioningActive);
    }

    #[test]
    fn test_connect_failure_falls_back_to_provisioning() {
        assert_eq!(StationConnecting.on(ConnectFailed).unwrap(), ProvisioningActive);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for event in [CredentialsFound, CredentialsMissing, Connected, ConnectFailed] {
            assert_eq!(
                ProvisioningActive.on(event),
                Err(InvalidTransition {
                    from: ProvisioningActive,
                    event
                })
            );
            assert!(StationConnected.on(event).is_err());
        }
    }

    #[test]
    fn test_no_shortcuts() {
        assert!(Unprovisioned.on(Connected).is_err());
        assert!(StationConnecting.on(CredentialsFound).is_err());
    }

    #[test]
    fn test_last_reading() {
        let last = LastReading::new();
        assert_eq!(last.snapshot(), None);

        let reading = Reading {
            moisture_percent: 62,
            raw_adc: 1500,
        };
        last.store(reading);
        assert_eq!(last.snapshot(), Some(reading));
    }
}
