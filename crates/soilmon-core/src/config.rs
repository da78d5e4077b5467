//! Static device configuration.
//!
//! Everything here is fixed at compile time. The only runtime-configurable
//! values on the device are the WiFi credentials submitted through the portal.

use alloc::string::String;
use core::fmt::Write;

use log::info;

use crate::sensors::Calibration;

/*** Sampling ***/

/// Time between two moisture samples (and uploads).
pub const SAMPLING_INTERVAL_MS: u64 = 5_000;

/// Pause at the end of every main-loop iteration.
pub const LOOP_YIELD_MS: u32 = 100;

/// Pause after a main-loop iteration failed before the next one starts.
pub const LOOP_ERROR_BACKOFF_MS: u32 = 1_000;

/*** Hardware ***/

/// GPIO wired to the moisture probe (ADC1 channel 6 on the ESP32).
pub const MOISTURE_ADC_GPIO: u8 = 34;

/// GPIO driving the activity LED, lit while an upload is in flight.
pub const INDICATOR_GPIO: u8 = 2;

/// Largest value the 12-bit ADC can report.
pub const ADC_MAX: u16 = 4095;

/// Raw reading measured with the probe in dry air.
pub const RAW_AIR: u16 = 4095;

/// Raw reading measured with the probe fully submerged.
pub const RAW_WATER: u16 = 0;

/// Calibration built from [`RAW_AIR`] and [`RAW_WATER`].
pub const CALIBRATION: Calibration = Calibration::new(RAW_AIR, RAW_WATER);

/*** WiFi ***/

/// How long a station connect may take before falling back to provisioning.
pub const CONNECT_TIMEOUT_MS: u32 = 12_000;

/// Period of the connection status poll while connecting.
pub const CONNECT_POLL_MS: u32 = 500;

/// SSID of the provisioning access point.
pub const AP_SSID: &str = "ESP32-CONFIG";

/// WPA2 passphrase of the provisioning access point.
pub const AP_PASSWORD: &str = "micropython";

/// Gateway address of the provisioning access point.
pub const AP_GATEWAY: [u8; 4] = [192, 168, 4, 1];

/// Grace delay between the portal's confirmation page and the restart.
pub const RESTART_GRACE_MS: u32 = 2_000;

/*** HTTP ***/

/// Port of both the provisioning portal and the status server.
pub const HTTP_PORT: u16 = 80;

/// Upper bound on a single uplink request, connect included.
pub const UPLINK_TIMEOUT_MS: u64 = 10_000;

/// Static description of the REST sink readings are inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkConfig<'a> {
    /// Service root without trailing slash, e.g. `http://example.org`.
    pub base_url: &'a str,
    /// Key sent both as `apikey` and as bearer token.
    pub api_key: &'a str,
    /// Table the readings are inserted into.
    pub table: &'a str,
}

impl<'a> UplinkConfig<'a> {
    pub const fn new(base_url: &'a str, api_key: &'a str, table: &'a str) -> Self {
        Self {
            base_url,
            api_key,
            table,
        }
    }

    /// Full insert URL: `{base_url}/rest/v1/{table}`.
    pub fn insert_url(&self) -> String {
        let mut url = String::with_capacity(self.base_url.len() + self.table.len() + 9);
        let _ = write!(
            url,
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        );
        url
    }

    /// Log the loaded configuration, masking the API key.
    pub fn log_config(&self) {
        info!("Uplink configuration:");
        info!("  insert url : {}", self.insert_url());
        info!("  api key    : {}", mask(self.api_key));
    }
}

/// Mask a secret for logging, keeping only the first four characters.
pub fn mask(secret: &str) -> String {
    let mut masked: String = secret.chars().take(4).collect();
    if secret.chars().count() > 4 || secret.is_empty() {
        masked.push_str("****");
    }
    masked
}
