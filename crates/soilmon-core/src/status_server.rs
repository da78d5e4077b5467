//! Local status endpoint serving the last reading while connected.

use alloc::string::String;

use log::{debug, warn};
use serde::Serialize;

use crate::app_state::LastReading;
use crate::net::http::{Response, request_target};
use crate::net::{Connection, Listener, NetError, read_request, try_accept};

/// Largest request head read from a status client.
const REQUEST_MAX: usize = 1024;

#[derive(Debug, Serialize)]
struct DataBody {
    moisture: Option<u8>,
    raw: Option<u16>,
}

/// Serves `GET /data` from the operational loop without ever blocking it.
pub struct StatusServer<L> {
    listener: L,
}

impl<L: Listener> StatusServer<L> {
    pub const fn new(listener: L) -> Self {
        Self { listener }
    }

    /// Serve at most one pending client. Returns whether a client was taken.
    ///
    /// All errors are logged here; the caller's loop always continues.
    pub async fn poll(&mut self, last: &LastReading) -> bool {
        let conn = match try_accept(&mut self.listener).await {
            None => return false,
            Some(Ok(conn)) => conn,
            Some(Err(e)) => {
                warn!("Status server accept failed: {}", e);
                return true;
            }
        };

        if let Err(e) = serve(conn, last).await {
            warn!("Status request failed: {}", e);
        }
        true
    }
}

/// Answer a single status request and close the connection.
pub async fn serve<C: Connection>(mut conn: C, last: &LastReading) -> Result<(), NetError> {
    let result = respond(&mut conn, last).await;
    conn.close().await;
    result
}

async fn respond<C: Connection>(conn: &mut C, last: &LastReading) -> Result<(), NetError> {
    let mut buf = [0u8; REQUEST_MAX];
    let len = read_request(conn, &mut buf).await?;
    if len == 0 {
        debug!("Status client sent nothing, closing");
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..len]);
    let path = request_target(&request);
    debug!("Status request -> {}", path);

    if !path.starts_with("/data") {
        return Response::not_found().write_to(conn).await;
    }

    let snapshot = last.snapshot();
    let body = DataBody {
        moisture: snapshot.map(|r| r.moisture_percent),
        raw: snapshot.map(|r| r.raw_adc),
    };

    match serde_json::to_string(&body) {
        Ok(json) => Response::json(&json).write_to(conn).await,
        Err(_) => {
            Response::new(500, "text/plain", b"Internal Server Error")
                .write_to(conn)
                .await
        }
    }
}
