//! Telemetry uplink: inserts each reading into a PostgREST-style REST table.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;
use core::future::Future;

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror_no_std::Error;

use crate::config::{UPLINK_TIMEOUT_MS, UplinkConfig};
use crate::net::NetError;
use crate::net::url::{Endpoint, UrlError};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkError {
    #[error("transport failed: {0}")]
    Net(NetError),
    #[error("bad insert URL: {0}")]
    Url(UrlError),
    #[error("response had no valid status line")]
    InvalidResponse,
    #[error("payload serialization failed")]
    Serialize,
}

impl From<NetError> for UplinkError {
    fn from(value: NetError) -> Self {
        Self::Net(value)
    }
}

impl From<UrlError> for UplinkError {
    fn from(value: UrlError) -> Self {
        Self::Url(value)
    }
}

/// JSON body of an insert. The raw ADC value is deliberately not uploaded.
#[derive(Debug, Serialize)]
struct InsertBody {
    moisture: u8,
}

/// A fully prepared insert request, handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertRequest<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
    pub body: &'a str,
    pub timeout_ms: u64,
}

impl InsertRequest<'_> {
    /// Request headers, authentication included.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut bearer = String::with_capacity(self.api_key.len() + 7);
        bearer.push_str("Bearer ");
        bearer.push_str(self.api_key);

        alloc::vec![
            ("apikey", String::from(self.api_key)),
            ("Authorization", bearer),
            ("Content-Type", String::from("application/json")),
            // Minimal return avoids needing SELECT rights on the table.
            ("Prefer", String::from("return=minimal")),
        ]
    }

    /// Render the request as HTTP/1.1 bytes for a raw TCP transport.
    pub fn to_http(&self) -> Result<String, UplinkError> {
        let endpoint = Endpoint::parse(self.url)?;

        let mut request = String::with_capacity(256 + self.body.len());
        let _ = write!(request, "POST {} HTTP/1.1\r\nHost: {}", endpoint.path, endpoint.host);
        if endpoint.port != 80 {
            let _ = write!(request, ":{}", endpoint.port);
        }
        request.push_str("\r\n");
        for (name, value) in self.headers() {
            let _ = write!(request, "{name}: {value}\r\n");
        }
        let _ = write!(
            request,
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.body.len(),
            self.body
        );

        Ok(request)
    }
}

/// Something that can deliver an HTTP POST and report the status code.
///
/// Implementations must give up after `request.timeout_ms`.
pub trait HttpTransport {
    fn post(&mut self, request: &InsertRequest<'_>)
    -> impl Future<Output = Result<u16, UplinkError>>;
}

/// Uploads readings to the configured table.
pub struct Uplink<T> {
    transport: T,
    insert_url: String,
    api_key: String,
}

impl<T: HttpTransport> Uplink<T> {
    pub fn new(transport: T, config: &UplinkConfig<'_>) -> Self {
        Self {
            transport,
            insert_url: config.insert_url(),
            api_key: String::from(config.api_key),
        }
    }

    /// Upload one reading.
    ///
    /// Returns the HTTP status of any completed exchange, 4xx and 5xx
    /// included, or `None` if the request never completed. Failures are
    /// logged, never raised.
    pub async fn send(&mut self, moisture_percent: u8, raw_adc: u16) -> Option<u16> {
        let body = match serde_json::to_string(&InsertBody {
            moisture: moisture_percent,
        }) {
            Ok(body) => body,
            Err(_) => {
                error!("Error sending reading: {}", UplinkError::Serialize);
                return None;
            }
        };

        let request = InsertRequest {
            url: &self.insert_url,
            api_key: &self.api_key,
            body: &body,
            timeout_ms: UPLINK_TIMEOUT_MS,
        };

        info!("POST -> {}", self.insert_url);
        debug!("Uploading moisture={}% (raw={})", moisture_percent, raw_adc);

        match self.transport.post(&request).await {
            Ok(status) if (200..300).contains(&status) => {
                info!("HTTP {}", status);
                Some(status)
            }
            Ok(status) => {
                warn!("HTTP {} from insert endpoint", status);
                Some(status)
            }
            Err(e) => {
                error!("Error sending reading: {}", e);
                None
            }
        }
    }

    pub fn insert_url(&self) -> &str {
        &self.insert_url
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
