//! esp-radio WiFi driver for the connectivity state machine.

use core::net::Ipv4Addr;

use embassy_net::Stack;
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, WifiController};
use log::{debug, warn};
use soilmon_core::config::{AP_GATEWAY, CONNECT_TIMEOUT_MS};
use soilmon_core::connectivity::{WifiDriver, WifiError};
use soilmon_core::storage::Credentials;

/// The radio plus the network stacks of both interfaces.
///
/// Only one role is active per boot: station while joining, access point
/// once provisioning starts.
pub struct EspWifi {
    controller: WifiController<'static>,
    sta: Stack<'static>,
    ap: Stack<'static>,
}

impl EspWifi {
    pub fn new(controller: WifiController<'static>, sta: Stack<'static>, ap: Stack<'static>) -> Self {
        Self { controller, sta, ap }
    }

    async fn restart_in(&mut self, mode: ModeConfig) -> Result<(), esp_radio::wifi::WifiError> {
        if self.controller.is_started().unwrap_or(false) {
            self.controller.stop_async().await?;
        }
        self.controller.set_config(&mode)?;
        self.controller.start_async().await
    }
}

impl WifiDriver for EspWifi {
    async fn activate_station(&mut self) -> Result<(), WifiError> {
        self.restart_in(ModeConfig::Client(ClientConfig::default()))
            .await
            .map_err(|e| {
                warn!("Starting station interface failed: {:?}", e);
                WifiError::Station
            })
    }

    fn is_station_connected(&mut self) -> bool {
        self.controller.is_connected().unwrap_or(false) && self.sta.is_config_up()
    }

    async fn connect_station(&mut self, credentials: &Credentials) -> Result<(), WifiError> {
        let client = ClientConfig::default()
            .with_ssid(credentials.ssid.as_str().into())
            .with_password(credentials.password.as_str().into());

        self.restart_in(ModeConfig::Client(client)).await.map_err(|e| {
            warn!("Configuring station failed: {:?}", e);
            WifiError::Station
        })?;

        // Association is bounded here; DHCP completion is polled by the caller.
        match with_timeout(
            Duration::from_millis(u64::from(CONNECT_TIMEOUT_MS)),
            self.controller.connect_async(),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!("Associated with {}", credentials.ssid);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Association failed: {:?}", e);
                Err(WifiError::Station)
            }
            Err(_) => {
                warn!("Association timed out");
                Err(WifiError::Station)
            }
        }
    }

    fn station_address(&self) -> Option<Ipv4Addr> {
        self.sta.config_v4().map(|config| config.address.address())
    }

    async fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        let ap = AccessPointConfig::default()
            .with_ssid(ssid.into())
            .with_password(password.into())
            .with_auth_method(AuthMethod::Wpa2Personal);

        self.restart_in(ModeConfig::AccessPoint(ap))
            .await
            .map_err(|e| {
                warn!("Starting access point failed: {:?}", e);
                WifiError::AccessPoint
            })?;

        self.ap.wait_link_up().await;
        Ok(())
    }

    fn access_point_address(&self) -> Ipv4Addr {
        self.ap
            .config_v4()
            .map(|config| config.address.address())
            .unwrap_or_else(|| {
                let [a, b, c, d] = AP_GATEWAY;
                Ipv4Addr::new(a, b, c, d)
            })
    }
}
