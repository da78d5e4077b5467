//! WiFi credential persistence.
//!
//! The record is two newline-terminated lines, `ssid\npassword\n`. Anything
//! that does not parse as such is treated as "unprovisioned".

use core::fmt;
use core::fmt::Write as _;

use log::{error, info, warn};
use thiserror_no_std::Error;

use super::{RECORD_CAPACITY, RecordStorage};
use crate::config::mask;

/// Longest SSID 802.11 allows.
pub const SSID_MAX: usize = 32;

/// Longest WPA2 passphrase.
pub const PASSWORD_MAX: usize = 64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("SSID is empty")]
    EmptySsid,
    #[error("SSID longer than 32 bytes")]
    SsidTooLong,
    #[error("password longer than 64 bytes")]
    PasswordTooLong,
}

/// A single WiFi network to join in station mode.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: heapless::String<SSID_MAX>,
    pub password: heapless::String<PASSWORD_MAX>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialsError> {
        if ssid.is_empty() {
            return Err(CredentialsError::EmptySsid);
        }

        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|_| CredentialsError::SsidTooLong)?,
            password: heapless::String::try_from(password)
                .map_err(|_| CredentialsError::PasswordTooLong)?,
        })
    }

    /// Parse a stored record. Each line is trimmed; the SSID must not be empty.
    pub fn from_record(record: &[u8]) -> Option<Self> {
        let text = core::str::from_utf8(record).ok()?;
        let mut lines = text.lines();
        let ssid = lines.next()?.trim();
        let password = lines.next()?.trim();

        Self::new(ssid, password).ok()
    }

    /// Serialize as `ssid\npassword\n`.
    pub fn to_record(&self) -> heapless::String<RECORD_CAPACITY> {
        let mut record = heapless::String::new();
        // SSID_MAX + PASSWORD_MAX + 2 fits RECORD_CAPACITY.
        let _ = write!(record, "{}\n{}\n", self.ssid, self.password);
        record
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid.as_str())
            .field("password", &mask(&self.password))
            .finish()
    }
}

/// Loads and saves the one credential record.
///
/// Neither operation returns an error: a broken or missing record simply means
/// "no credentials", and a failed save is logged and reported as `false`.
pub struct CredentialStore<S> {
    storage: S,
}

impl<S: RecordStorage> CredentialStore<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn load(&mut self) -> Option<Credentials> {
        let mut buf = [0u8; RECORD_CAPACITY];
        let len = match self.storage.read_record(&mut buf) {
            Ok(Some(len)) => len,
            Ok(None) => {
                info!("No saved WiFi credentials");
                return None;
            }
            Err(e) => {
                warn!("Reading saved WiFi credentials failed: {}", e);
                return None;
            }
        };

        let credentials = Credentials::from_record(&buf[..len]);
        if credentials.is_none() {
            warn!("Saved WiFi credentials are malformed, ignoring them");
        }
        credentials
    }

    pub fn save(&mut self, ssid: &str, password: &str) -> bool {
        let credentials = match Credentials::new(ssid, password) {
            Ok(c) => c,
            Err(e) => {
                error!("Refusing to save WiFi credentials: {}", e);
                return false;
            }
        };

        match self.storage.write_record(credentials.to_record().as_bytes()) {
            Ok(()) => {
                info!("Saved WiFi credentials for SSID {}", credentials.ssid);
                true
            }
            Err(e) => {
                error!("Error saving WiFi credentials: {}", e);
                false
            }
        }
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
