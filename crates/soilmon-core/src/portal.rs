//! Captive configuration portal served from the access point.
//!
//! Every path except `/config` gets the form. A submission with a non-empty
//! SSID is persisted and answered with a confirmation page, after which the
//! device restarts into station mode.

use alloc::string::String;
use alloc::vec;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{LOOP_YIELD_MS, RESTART_GRACE_MS};
use crate::net::http::{Response, request_target, split_target};
use crate::net::url::QueryParams;
use crate::net::{Connection, Listener, NetError, read_request};
use crate::storage::{CredentialStore, RecordStorage};

/// Largest request head read from a portal client.
const REQUEST_MAX: usize = 2048;

pub const FORM_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>WiFi setup</title>
<style>
  body { font-family: sans-serif; background:#f0f2f5; }
  .card { max-width:400px;margin:40px auto;padding:20px;background:white;border-radius:8px;box-shadow:0 4px 8px rgba(0,0,0,.1); }
  input { width:100%; padding:10px;margin:8px 0;border:1px solid #ccc;border-radius:6px; }
  button { width:100%; padding:10px;background:#007bff;color:white;border:none;border-radius:6px; }
</style>
</head>
<body><div class="card">
<h3>Configure WiFi</h3>
<form action="/config" method="get">
  <input name="ssid" placeholder="SSID"><br>
  <input name="password" placeholder="Password" type="password"><br>
  <button type="submit">Save and restart</button>
</form>
</div></body></html>
"#;

pub const CONFIRMATION_PAGE: &str = "<h2>Credentials saved. Restarting...</h2>";

/// What the portal loop does after a connection was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalAction {
    Continue,
    Restart,
}

/// Serve the portal until a configuration is saved.
///
/// Returns once the restart grace delay has elapsed; the caller performs the
/// restart itself.
pub async fn serve<L, S, D>(listener: &mut L, store: &mut CredentialStore<S>, delay: &mut D)
where
    L: Listener,
    S: RecordStorage,
    D: DelayNs,
{
    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Portal accept failed: {}", e);
                delay.delay_ms(LOOP_YIELD_MS).await;
                continue;
            }
        };

        match handle_connection(conn, store).await {
            Ok(PortalAction::Continue) => {}
            Ok(PortalAction::Restart) => {
                info!("Restarting in {} ms", RESTART_GRACE_MS);
                delay.delay_ms(RESTART_GRACE_MS).await;
                return;
            }
            Err(e) => error!("Portal request failed: {}", e),
        }
    }
}

/// Handle one portal client and close the connection.
pub async fn handle_connection<C, S>(
    mut conn: C,
    store: &mut CredentialStore<S>,
) -> Result<PortalAction, NetError>
where
    C: Connection,
    S: RecordStorage,
{
    let result = respond(&mut conn, store).await;
    conn.close().await;
    result
}

async fn respond<C, S>(conn: &mut C, store: &mut CredentialStore<S>) -> Result<PortalAction, NetError>
where
    C: Connection,
    S: RecordStorage,
{
    let mut buf = vec![0u8; REQUEST_MAX];
    let len = read_request(conn, &mut buf).await?;
    if len == 0 {
        debug!("Portal client sent nothing, closing");
        return Ok(PortalAction::Continue);
    }

    let request = String::from_utf8_lossy(&buf[..len]);
    let target = request_target(&request);
    info!("Portal request -> {}", target);

    if target.starts_with("/config") {
        let (_, query) = split_target(target);
        let params = QueryParams::parse(query.unwrap_or_default());
        let ssid = params.get("ssid").unwrap_or_default().trim();
        let password = params.get("password").unwrap_or_default().trim();

        if !ssid.is_empty() {
            if store.save(ssid, password) {
                // Already persisted: restart even if the page cannot be sent.
                if let Err(e) = Response::html(CONFIRMATION_PAGE).write_to(conn).await {
                    warn!("Sending confirmation page failed: {}", e);
                }
                return Ok(PortalAction::Restart);
            }
            warn!("Credentials were not saved, serving the form again");
        }
    }

    Response::html(FORM_PAGE).write_to(conn).await?;
    Ok(PortalAction::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use crate::test_support::{FakeClock, FakeListener, MemRecord, ScriptedConnection};
    use embassy_futures::block_on;

    fn request(target: &str) -> alloc::string::String {
        alloc::format!("GET {} HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\n", target)
    }

    #[test]
    fn test_root_serves_form() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, peer) = ScriptedConnection::new(request("/").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();

        assert_eq!(action, PortalAction::Continue);
        assert!(peer.output().starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(peer.output().contains("text/html"));
        assert!(peer.output().contains(r#"<form action="/config" method="get">"#));
        assert!(peer.closed());
    }

    #[test]
    fn test_unknown_path_serves_form() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, peer) = ScriptedConnection::new(request("/generate_204").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();
        assert_eq!(action, PortalAction::Continue);
        assert!(peer.output().contains("Configure WiFi"));
    }

    #[test]
    fn test_config_saves_and_restarts() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, peer) =
            ScriptedConnection::new(request("/config?ssid=Home&password=pass123").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();

        assert_eq!(action, PortalAction::Restart);
        assert!(peer.output().ends_with(CONFIRMATION_PAGE));
        assert!(peer.closed());
        let saved = store.load().unwrap();
        assert_eq!(saved.ssid.as_str(), "Home");
        assert_eq!(saved.password.as_str(), "pass123");
    }

    #[test]
    fn test_config_decodes_and_trims() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, _) = ScriptedConnection::new(
            request("/config?ssid=+My+Home%21+&password=p%40ss+word").as_bytes(),
        );

        block_on(handle_connection(conn, &mut store)).unwrap();

        let saved = store.load().unwrap();
        assert_eq!(saved.ssid.as_str(), "My Home!");
        assert_eq!(saved.password.as_str(), "p@ss word");
    }

    #[test]
    fn test_empty_ssid_serves_form_without_saving() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, peer) = ScriptedConnection::new(request("/config?ssid=+&password=x").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();

        assert_eq!(action, PortalAction::Continue);
        assert!(peer.output().contains("Configure WiFi"));
        assert_eq!(store.storage_mut().data, None);
    }

    #[test]
    fn test_config_without_query_serves_form() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, _) = ScriptedConnection::new(request("/config").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();
        assert_eq!(action, PortalAction::Continue);
        assert_eq!(store.storage_mut().data, None);
    }

    #[test]
    fn test_failed_save_serves_form() {
        let mut record = MemRecord::default();
        record.fail_with = Some(StorageError::Io);
        let mut store = CredentialStore::new(record);
        let (conn, peer) =
            ScriptedConnection::new(request("/config?ssid=Home&password=pass123").as_bytes());

        let action = block_on(handle_connection(conn, &mut store)).unwrap();

        assert_eq!(action, PortalAction::Continue);
        assert!(peer.output().contains("Configure WiFi"));
    }

    #[test]
    fn test_empty_request_is_closed() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (conn, peer) = ScriptedConnection::new(b"");

        let action = block_on(handle_connection(conn, &mut store)).unwrap();
        assert_eq!(action, PortalAction::Continue);
        assert_eq!(peer.output(), "");
        assert!(peer.closed());
    }

    #[test]
    fn test_serve_until_configured() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (broken, broken_peer) = ScriptedConnection::new(b"");
        let (form, form_peer) = ScriptedConnection::new(request("/").as_bytes());
        let (config, _) =
            ScriptedConnection::new(request("/config?ssid=Home&password=pass123").as_bytes());
        let mut listener = FakeListener::with(alloc::vec![broken, form, config]);
        let clock = FakeClock::new();
        let mut delay = clock.delay();

        block_on(serve(&mut listener, &mut store, &mut delay));

        assert!(broken_peer.closed());
        assert!(form_peer.output().contains("Configure WiFi"));
        assert_eq!(delay.slept_ms(), u64::from(RESTART_GRACE_MS));
        assert!(store.load().is_some());
    }

    #[test]
    fn test_serve_survives_failed_connection() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (mut broken, broken_peer) = ScriptedConnection::new(request("/").as_bytes());
        broken.fail_reads();
        let (config, config_peer) =
            ScriptedConnection::new(request("/config?ssid=Home&password=pass123").as_bytes());
        let mut listener = FakeListener::with(alloc::vec![broken, config]);
        let clock = FakeClock::new();
        let mut delay = clock.delay();

        block_on(serve(&mut listener, &mut store, &mut delay));

        assert!(broken_peer.closed());
        assert_eq!(broken_peer.output(), "");
        assert!(config_peer.output().contains("Credentials saved"));
        assert_eq!(store.load().unwrap().ssid.as_str(), "Home");
        assert_eq!(delay.slept_ms(), u64::from(RESTART_GRACE_MS));
    }

    #[test]
    fn test_serve_survives_accept_errors() {
        let mut store = CredentialStore::new(MemRecord::default());
        let (config, _) =
            ScriptedConnection::new(request("/config?ssid=Home&password=pass123").as_bytes());
        let mut listener = FakeListener::with(alloc::vec![config]);
        listener.accept_errors = 2;
        let clock = FakeClock::new();
        let mut delay = clock.delay();

        block_on(serve(&mut listener, &mut store, &mut delay));

        assert_eq!(listener.accept_errors, 0);
        assert!(store.load().is_some());
        assert_eq!(
            delay.slept_ms(),
            u64::from(2 * LOOP_YIELD_MS + RESTART_GRACE_MS)
        );
    }
}
