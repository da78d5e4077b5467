//! Network seams shared by the provisioning portal and the status server.
//!
//! The core never touches sockets directly. A platform provides a
//! [`Listener`] bound to the HTTP port whose accepted [`Connection`]s speak
//! `embedded-io-async`.

pub mod http;
pub mod url;

use core::future::Future;

use embassy_futures::select::{Either, select};
use embassy_futures::yield_now;
use embedded_io_async::{Read, Write};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("connection I/O failed: {0:?}")]
    Io(embedded_io::ErrorKind),
    #[error("listener failed")]
    Listen,
    #[error("could not connect to remote host")]
    Connect,
    #[error("name resolution failed")]
    Dns,
    #[error("operation timed out")]
    Timeout,
}

/// Map any `embedded-io` error onto [`NetError::Io`].
pub fn io_error<E: embedded_io::Error>(error: E) -> NetError {
    NetError::Io(error.kind())
}

/// One accepted TCP connection.
pub trait Connection: Read + Write {
    /// Flush and close the connection. Errors are swallowed; there is no one
    /// left to report them to.
    fn close(self) -> impl Future<Output = ()>;
}

/// A TCP listener bound to a single port, serving one connection at a time.
pub trait Listener {
    type Connection<'a>: Connection
    where
        Self: 'a;

    /// Wait until a client connects.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Connection<'_>, NetError>>;
}

/// Attempt one accept without waiting.
///
/// The accept future is polled once and raced against a single executor
/// yield. Returns `None` if no client is pending. Listener implementations
/// must tolerate their accept future being dropped before completion.
pub async fn try_accept<L: Listener>(
    listener: &mut L,
) -> Option<Result<L::Connection<'_>, NetError>> {
    match select(listener.accept(), yield_now()).await {
        Either::First(result) => Some(result),
        Either::Second(()) => None,
    }
}

/// Read the start of a request with a single read, as small firmware servers
/// do. Returns the number of bytes read; 0 means the peer sent nothing.
pub async fn read_request<C: Read>(conn: &mut C, buf: &mut [u8]) -> Result<usize, NetError> {
    conn.read(buf).await.map_err(io_error)
}
