//! embassy-net adapters for the core's listener, connection and uplink
//! transport seams.

use core::net::Ipv4Addr;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::{Read as _, Write as _};
use log::{debug, warn};
use soilmon_core::net::http::parse_status_line;
use soilmon_core::net::url::Endpoint;
use soilmon_core::net::{Connection, Listener, NetError, io_error};
use soilmon_core::uplink::{HttpTransport, InsertRequest, UplinkError};

/// Idle timeout on every socket, so a silent peer cannot stall the loop.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll period while a client is still completing its handshake.
const HANDSHAKE_POLL: Duration = Duration::from_millis(10);

/// Largest response head read while looking for the status line.
const STATUS_LINE_MAX: usize = 256;

/// `embassy_net::tcp::Error` as an `embedded-io` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketError(pub embassy_net::tcp::Error);

impl core::fmt::Display for SocketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl core::error::Error for SocketError {}

impl embedded_io::Error for SocketError {
    fn kind(&self) -> embedded_io::ErrorKind {
        // The only error embassy-net reports on an established socket.
        embedded_io::ErrorKind::ConnectionReset
    }
}

/// A connected TCP socket.
pub struct SocketConnection<'a, 'd> {
    socket: &'a mut TcpSocket<'d>,
}

impl<'a, 'd> SocketConnection<'a, 'd> {
    pub fn new(socket: &'a mut TcpSocket<'d>) -> Self {
        Self { socket }
    }
}

impl embedded_io::ErrorType for SocketConnection<'_, '_> {
    type Error = SocketError;
}

impl embedded_io_async::Read for SocketConnection<'_, '_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(SocketError)
    }
}

impl embedded_io_async::Write for SocketConnection<'_, '_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(SocketError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(SocketError)
    }
}

impl Connection for SocketConnection<'_, '_> {
    async fn close(self) {
        self.socket.close();
        if let Err(e) = self.socket.flush().await {
            debug!("Flush on close failed: {:?}", e);
        }
        // Back to Closed so the next accept can listen again.
        self.socket.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptStep {
    /// A client is connected and can be served.
    Ready,
    /// A client is mid-handshake.
    AwaitHandshake,
    /// No client yet: listen (a no-op while already listening).
    Listen,
    /// Leftover from a previous connection.
    Reset,
}

fn accept_step(state: State) -> AcceptStep {
    match state {
        State::Established | State::CloseWait => AcceptStep::Ready,
        State::SynReceived => AcceptStep::AwaitHandshake,
        State::Closed | State::Listen => AcceptStep::Listen,
        _ => AcceptStep::Reset,
    }
}

/// One listening socket, reused for every client.
///
/// The socket outlives dropped accept futures, so a client may finish its
/// handshake between two polls. `accept` therefore looks at the socket state
/// first and only listens again from `Closed` or `Listen`.
pub struct SocketListener<'d> {
    socket: TcpSocket<'d>,
    port: u16,
}

impl<'d> SocketListener<'d> {
    pub fn new(stack: Stack<'d>, port: u16, rx: &'d mut [u8], tx: &'d mut [u8]) -> Self {
        let mut socket = TcpSocket::new(stack, rx, tx);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        Self { socket, port }
    }
}

impl<'d> Listener for SocketListener<'d> {
    type Connection<'a>
        = SocketConnection<'a, 'd>
    where
        Self: 'a;

    async fn accept(&mut self) -> Result<Self::Connection<'_>, NetError> {
        loop {
            match accept_step(self.socket.state()) {
                AcceptStep::Ready => break,
                AcceptStep::AwaitHandshake => Timer::after(HANDSHAKE_POLL).await,
                AcceptStep::Listen => {
                    if let Err(e) = self.socket.accept(self.port).await {
                        warn!("Accept on port {} failed: {:?}", self.port, e);
                        self.socket.abort();
                        return Err(NetError::Listen);
                    }
                    break;
                }
                AcceptStep::Reset => {
                    debug!("Dropping socket left in {:?}", self.socket.state());
                    self.socket.abort();
                }
            }
        }
        debug!("Client {:?} connected", self.socket.remote_endpoint());
        Ok(SocketConnection::new(&mut self.socket))
    }
}

/// Plain-HTTP uplink over a fresh TCP connection per request.
pub struct TcpTransport<'d> {
    stack: Stack<'d>,
    rx: &'d mut [u8],
    tx: &'d mut [u8],
}

impl<'d> TcpTransport<'d> {
    pub fn new(stack: Stack<'d>, rx: &'d mut [u8], tx: &'d mut [u8]) -> Self {
        Self { stack, rx, tx }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddress, NetError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(ip));
        }
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup of {} failed: {:?}", host, e);
                NetError::Dns
            })?;
        addresses.first().copied().ok_or(NetError::Dns)
    }

    async fn exchange(&mut self, endpoint: &Endpoint<'_>, request: &[u8]) -> Result<u16, UplinkError> {
        let address = self.resolve(endpoint.host).await?;

        let mut socket = TcpSocket::new(self.stack, &mut *self.rx, &mut *self.tx);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket
            .connect((address, endpoint.port))
            .await
            .map_err(|e| {
                warn!("Connecting to {}:{} failed: {:?}", endpoint.host, endpoint.port, e);
                NetError::Connect
            })?;

        let mut conn = SocketConnection::new(&mut socket);
        conn.write_all(request).await.map_err(io_error)?;
        conn.flush().await.map_err(io_error)?;

        let mut head = [0u8; STATUS_LINE_MAX];
        let mut len = 0;
        let status = loop {
            let n = conn.read(&mut head[len..]).await.map_err(io_error)?;
            len += n;
            if let Some(status) = parse_status_line(&head[..len]) {
                break Some(status);
            }
            if n == 0 || len == head.len() {
                break None;
            }
        };
        conn.close().await;

        status.ok_or(UplinkError::InvalidResponse)
    }
}

impl HttpTransport for TcpTransport<'_> {
    async fn post(&mut self, request: &InsertRequest<'_>) -> Result<u16, UplinkError> {
        let endpoint = Endpoint::parse(request.url)?;
        let http = request.to_http()?;

        with_timeout(
            Duration::from_millis(request.timeout_ms),
            self.exchange(&endpoint, http.as_bytes()),
        )
        .await
        .map_err(|_| UplinkError::Net(NetError::Timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_connected_between_polls_is_served() {
        assert_eq!(accept_step(State::Established), AcceptStep::Ready);
        assert_eq!(accept_step(State::CloseWait), AcceptStep::Ready);
    }

    #[test]
    fn test_handshake_in_progress_is_awaited() {
        assert_eq!(accept_step(State::SynReceived), AcceptStep::AwaitHandshake);
    }

    #[test]
    fn test_only_idle_sockets_listen() {
        assert_eq!(accept_step(State::Closed), AcceptStep::Listen);
        assert_eq!(accept_step(State::Listen), AcceptStep::Listen);
        assert_eq!(accept_step(State::TimeWait), AcceptStep::Reset);
        assert_eq!(accept_step(State::LastAck), AcceptStep::Reset);
    }
}
