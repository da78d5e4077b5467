//! Runtime configuration of the simulator.
//!
//! Loaded once from environment variables, with optional `.env` support
//! provided by the caller.

use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use log::{info, warn};
use soilmon_core::config::UplinkConfig;

/// Outcome the simulated station reports when asked to join a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOutcome {
    Connects,
    NeverConnects,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Port both the portal and the status server bind to.
    pub http_port: u16,
    /// Stand-in for the device's credential record.
    pub wifi_file: PathBuf,
    pub station: StationOutcome,
    pub base_url: String,
    pub api_key: String,
    pub table: String,
}

fn optional_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} is not set, uploads will fail", name);
        String::new()
    })
}

/// Load settings from the environment.
///
/// Optional:
/// - `SOILMON_HTTP_PORT` (default 8080)
/// - `SOILMON_WIFI_FILE` (default `wifi.txt`)
/// - `SOILMON_SIM_WIFI`, `ok` or `fail` (default `ok`)
/// - `SOILMON_BASE_URL`, `SOILMON_API_KEY`, `SOILMON_TABLE`
pub fn load_from_env() -> Result<Settings> {
    let http_port = env::var("SOILMON_HTTP_PORT")
        .ok()
        .map(|v| v.parse::<u16>())
        .transpose()
        .map_err(|e| anyhow!("Invalid SOILMON_HTTP_PORT: {}", e))?
        .unwrap_or(8080);

    let station = match env::var("SOILMON_SIM_WIFI").as_deref() {
        Ok("ok") | Err(_) => StationOutcome::Connects,
        Ok("fail") => StationOutcome::NeverConnects,
        Ok(other) => return Err(anyhow!("Invalid SOILMON_SIM_WIFI: {} (expected ok|fail)", other)),
    };

    Ok(Settings {
        http_port,
        wifi_file: env::var("SOILMON_WIFI_FILE")
            .unwrap_or_else(|_| String::from("wifi.txt"))
            .into(),
        station,
        base_url: optional_env("SOILMON_BASE_URL"),
        api_key: optional_env("SOILMON_API_KEY"),
        table: optional_env("SOILMON_TABLE"),
    })
}

impl Settings {
    pub fn uplink(&self) -> UplinkConfig<'_> {
        UplinkConfig::new(&self.base_url, &self.api_key, &self.table)
    }

    pub fn log_config(&self) {
        info!("Simulator configuration:");
        info!("  http port  : {}", self.http_port);
        info!("  wifi file  : {}", self.wifi_file.display());
        info!("  station    : {:?}", self.station);
        self.uplink().log_config();
    }
}
