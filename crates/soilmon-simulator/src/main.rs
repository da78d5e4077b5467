//! Desktop simulator for the soilmon soil moisture device.
//!
//! Runs the soilmon core against host sockets, a file-backed credential
//! record and a synthetic moisture probe, so the provisioning portal, the
//! status server and the uplink can be exercised without hardware.
//!
//! # Trying it out
//!
//! | Step                                  | Result                               |
//! |---------------------------------------|--------------------------------------|
//! | Start without `wifi.txt`              | Portal on `http://localhost:8080/`   |
//! | Submit the form                       | `wifi.txt` written, simulated restart|
//! | After the restart                     | Samples every 5 s, `/data` answers   |
//! | `SOILMON_SIM_WIFI=fail`               | Join fails, portal comes back        |

mod devices;
mod net;
mod settings;

use std::net::SocketAddr;

use dotenvy::dotenv;
use log::info;

use soilmon_core::app_state::LastReading;
use soilmon_core::config::CALIBRATION;
use soilmon_core::connectivity::{BootOutcome, ConnectivityManager};
use soilmon_core::operational::OperationalLoop;
use soilmon_core::sensors::MoistureSensor;
use soilmon_core::status_server::StatusServer;
use soilmon_core::storage::CredentialStore;
use soilmon_core::uplink::Uplink;

use devices::{FileRecord, LogPin, SimWifi, StdClock, SyntheticAdc, TokioDelay};
use net::{ReqwestTransport, SimListener};

static LAST_READING: LastReading = LastReading::new();

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting soilmon simulator");

    let settings = settings::load_from_env()?;
    settings.log_config();

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.http_port));

    // Each pass is one device boot. A restart drops every peripheral and
    // starts over, as the firmware's software reset would.
    let manager = loop {
        let mut store = CredentialStore::new(FileRecord::new(&settings.wifi_file));
        let mut portal_listener = SimListener::new(addr);
        let wifi = SimWifi::new(settings.station);
        let mut manager = ConnectivityManager::new(wifi, TokioDelay, StdClock::new());

        match manager.boot(&mut store, &mut portal_listener).await {
            BootOutcome::Connected => break manager,
            BootOutcome::Restart => info!("Simulated restart"),
        }
    };

    // ---------------------------------------------------------------------------
    // Operational phase
    // ---------------------------------------------------------------------------

    let sensor = MoistureSensor::new(SyntheticAdc::new(), CALIBRATION);
    let uplink = Uplink::new(ReqwestTransport::new(), &settings.uplink());
    let status = StatusServer::new(SimListener::new(addr));
    info!("Status server on http://localhost:{}/data", settings.http_port);

    let (_wifi, delay) = manager.into_parts();
    let mut operational = OperationalLoop::new(
        sensor,
        uplink,
        status,
        LogPin,
        StdClock::new(),
        delay,
        &LAST_READING,
    );
    operational.run().await
}
