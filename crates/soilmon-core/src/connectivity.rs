//! Boot-time connectivity: join the saved network or fall back to the
//! provisioning portal.

use core::future::Future;
use core::net::Ipv4Addr;

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::app_state::{ConnectionEvent, ConnectionState};
use crate::config::{AP_PASSWORD, AP_SSID, CONNECT_POLL_MS, CONNECT_TIMEOUT_MS};
use crate::net::Listener;
use crate::operational::Clock;
use crate::portal;
use crate::storage::{CredentialStore, Credentials, RecordStorage};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    #[error("station interface failed")]
    Station,
    #[error("access point failed to start")]
    AccessPoint,
}

/// The WiFi radio, in station or access-point role.
pub trait WifiDriver {
    /// Bring up the station interface without joining anything.
    fn activate_station(&mut self) -> impl Future<Output = Result<(), WifiError>>;

    /// Whether the station is associated and has an address.
    fn is_station_connected(&mut self) -> bool;

    /// Start joining `credentials`. Completion is observed through
    /// [`is_station_connected`](Self::is_station_connected).
    fn connect_station(
        &mut self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), WifiError>>;

    fn station_address(&self) -> Option<Ipv4Addr>;

    /// Start a WPA2 access point.
    fn start_access_point(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), WifiError>>;

    fn access_point_address(&self) -> Ipv4Addr;
}

/// How a boot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Joined the saved network; the operational loop takes over.
    Connected,
    /// The device must restart. Returned after provisioning saved new
    /// credentials, or if the access point could not be started.
    Restart,
}

/// Drives the [`ConnectionState`] machine against a WiFi driver.
pub struct ConnectivityManager<W, D, C> {
    wifi: W,
    delay: D,
    clock: C,
    state: ConnectionState,
}

impl<W: WifiDriver, D: DelayNs, C: Clock> ConnectivityManager<W, D, C> {
    pub const fn new(wifi: W, delay: D, clock: C) -> Self {
        Self {
            wifi,
            delay,
            clock,
            state: ConnectionState::Unprovisioned,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn into_parts(self) -> (W, D) {
        (self.wifi, self.delay)
    }

    /// Run one boot: join the saved network, or serve the portal on
    /// `portal_listener` until new credentials are saved.
    pub async fn boot<S, L>(
        &mut self,
        store: &mut CredentialStore<S>,
        portal_listener: &mut L,
    ) -> BootOutcome
    where
        S: RecordStorage,
        L: Listener,
    {
        self.state = ConnectionState::Unprovisioned;

        match store.load() {
            Some(credentials) => {
                self.advance(ConnectionEvent::CredentialsFound);
                if self.join(&credentials).await {
                    self.advance(ConnectionEvent::Connected);
                    return BootOutcome::Connected;
                }
                warn!("Could not join {}, starting provisioning", credentials.ssid);
                self.advance(ConnectionEvent::ConnectFailed);
            }
            None => self.advance(ConnectionEvent::CredentialsMissing),
        }

        self.provision(store, portal_listener).await
    }

    async fn join(&mut self, credentials: &Credentials) -> bool {
        if let Err(e) = self.wifi.activate_station().await {
            error!("{}", e);
            return false;
        }

        if !self.wifi.is_station_connected() {
            info!("Connecting to {}...", credentials.ssid);
            // One budget for association and address assignment together.
            let deadline_ms = self.clock.now_ms() + u64::from(CONNECT_TIMEOUT_MS);
            if let Err(e) = self.wifi.connect_station(credentials).await {
                error!("{}", e);
                return false;
            }

            if !self.wait_connected(deadline_ms).await {
                warn!("No connection after {} ms", CONNECT_TIMEOUT_MS);
                return false;
            }
        }

        match self.wifi.station_address() {
            Some(ip) => info!("Connected to {}, IP {}", credentials.ssid, ip),
            None => info!("Connected to {}", credentials.ssid),
        }
        true
    }

    async fn wait_connected(&mut self, deadline_ms: u64) -> bool {
        while self.clock.now_ms() < deadline_ms {
            if self.wifi.is_station_connected() {
                return true;
            }
            self.delay.delay_ms(CONNECT_POLL_MS).await;
        }
        self.wifi.is_station_connected()
    }

    async fn provision<S, L>(
        &mut self,
        store: &mut CredentialStore<S>,
        listener: &mut L,
    ) -> BootOutcome
    where
        S: RecordStorage,
        L: Listener,
    {
        if let Err(e) = self.wifi.start_access_point(AP_SSID, AP_PASSWORD).await {
            error!("{}, restarting", e);
            return BootOutcome::Restart;
        }
        info!(
            "Provisioning AP {} up, portal at http://{}/",
            AP_SSID,
            self.wifi.access_point_address()
        );

        portal::serve(listener, store, &mut self.delay).await;
        BootOutcome::Restart
    }

    fn advance(&mut self, event: ConnectionEvent) {
        match self.state.on(event) {
            Ok(next) => {
                info!("WiFi: {} -> {}", self.state.label(), next.label());
                self.state = next;
            }
            Err(e) => error!("{}", e),
        }
    }
}
