//! Host sockets behind the core's network traits.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use soilmon_core::net::{Connection, Listener, NetError};
use soilmon_core::uplink::{HttpTransport, InsertRequest, UplinkError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// TCP listener that binds on first accept.
///
/// Binding lazily lets the portal and the status server share a port across
/// simulated restarts: the previous owner is dropped before the next binds.
pub struct SimListener {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl SimListener {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
        }
    }
}

impl Listener for SimListener {
    type Connection<'a> = SimConnection;

    async fn accept(&mut self) -> Result<SimConnection, NetError> {
        if self.listener.is_none() {
            let listener = TcpListener::bind(self.addr).await.map_err(|e| {
                warn!("Binding {} failed: {}", self.addr, e);
                NetError::Listen
            })?;
            debug!("Listening on {}", self.addr);
            self.listener = Some(listener);
        }

        let Some(listener) = self.listener.as_ref() else {
            return Err(NetError::Listen);
        };
        let (stream, peer) = listener.accept().await.map_err(|_| NetError::Listen)?;
        debug!("Client {} connected", peer);
        Ok(SimConnection { stream })
    }
}

pub struct SimConnection {
    stream: TcpStream,
}

impl embedded_io_async::ErrorType for SimConnection {
    type Error = std::io::Error;
}

impl embedded_io_async::Read for SimConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).await
    }
}

impl embedded_io_async::Write for SimConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().await
    }
}

impl Connection for SimConnection {
    async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Uplink transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post(&mut self, request: &InsertRequest<'_>) -> Result<u16, UplinkError> {
        let mut builder = self
            .client
            .post(request.url)
            .timeout(Duration::from_millis(request.timeout_ms))
            .body(request.body.to_owned());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            debug!("Upload failed: {}", e);
            if e.is_timeout() {
                UplinkError::Net(NetError::Timeout)
            } else {
                UplinkError::Net(NetError::Connect)
            }
        })?;
        Ok(response.status().as_u16())
    }
}
