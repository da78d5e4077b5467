//! Fakes for the hardware seams, shared by the unit tests.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::net::Ipv4Addr;

use embedded_io::ErrorKind;

use crate::connectivity::{WifiDriver, WifiError};
use crate::net::{Connection, Listener, NetError};
use crate::operational::Clock;
use crate::sensors::{RawAdc, SensorError};
use crate::storage::{Credentials, RecordStorage, StorageError};
use crate::uplink::{HttpTransport, InsertRequest, UplinkError};

/*** Sensors ***/

/// ADC returning a fixed sequence of values, repeating the last one.
pub struct FakeAdc {
    values: Vec<u16>,
    next: usize,
    fail: bool,
    failures_left: usize,
}

impl FakeAdc {
    pub fn new(values: &[u16]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
            fail: false,
            failures_left: 0,
        }
    }

    /// Fails `failures` reads, then replays `values`.
    pub fn failing_first(failures: usize, values: &[u16]) -> Self {
        Self {
            failures_left: failures,
            ..Self::new(values)
        }
    }

    pub fn failing() -> Self {
        Self {
            values: Vec::new(),
            next: 0,
            fail: true,
            failures_left: 0,
        }
    }
}

impl RawAdc for FakeAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(SensorError::ReadFailed {
                sensor: "fake adc",
                operation: "read",
            });
        }
        if self.fail || self.values.is_empty() {
            return Err(SensorError::ReadFailed {
                sensor: "fake adc",
                operation: "read",
            });
        }

        let value = self.values[self.next.min(self.values.len() - 1)];
        self.next += 1;
        Ok(value)
    }
}

/*** Storage ***/

/// In-memory NOR flash.
pub struct MemFlash {
    pub bytes: Vec<u8>,
    pub fail: bool,
}

impl MemFlash {
    pub fn erased(size: usize) -> Self {
        Self {
            bytes: alloc::vec![0xFF; size],
            fail: false,
        }
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, ()> {
        let start = offset as usize;
        let end = start + len;
        if self.fail || end > self.bytes.len() {
            return Err(());
        }
        Ok(start..end)
    }
}

impl embedded_storage::ReadStorage for MemFlash {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl embedded_storage::Storage for MemFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// Record storage holding the record in memory.
#[derive(Default)]
pub struct MemRecord {
    pub data: Option<Vec<u8>>,
    pub fail_with: Option<StorageError>,
}

impl MemRecord {
    pub fn with(data: &[u8]) -> Self {
        Self {
            data: Some(data.to_vec()),
            fail_with: None,
        }
    }
}

impl RecordStorage for MemRecord {
    fn read_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        match &self.data {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }

    fn write_record(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        self.data = Some(data.to_vec());
        Ok(())
    }
}

/*** Network ***/

#[derive(Default)]
struct Wire {
    output: Vec<u8>,
    closed: bool,
}

/// A connection that replays a fixed request and records the response.
pub struct ScriptedConnection {
    input: Vec<u8>,
    pos: usize,
    fail_reads: bool,
    wire: Rc<RefCell<Wire>>,
}

/// Observes what was written to a [`ScriptedConnection`] after it was moved.
#[derive(Clone)]
pub struct ConnectionPeer {
    wire: Rc<RefCell<Wire>>,
}

impl ScriptedConnection {
    pub fn new(input: &[u8]) -> (Self, ConnectionPeer) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let conn = Self {
            input: input.to_vec(),
            pos: 0,
            fail_reads: false,
            wire: wire.clone(),
        };
        (conn, ConnectionPeer { wire })
    }

    pub fn fail_reads(&mut self) {
        self.fail_reads = true;
    }
}

impl ConnectionPeer {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.wire.borrow().output).into_owned()
    }

    pub fn closed(&self) -> bool {
        self.wire.borrow().closed
    }
}

impl embedded_io::ErrorType for ScriptedConnection {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for ScriptedConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fail_reads {
            return Err(ErrorKind::ConnectionReset);
        }
        let rest = &self.input[self.pos..];
        let len = rest.len().min(buf.len());
        buf[..len].copy_from_slice(&rest[..len]);
        self.pos += len;
        Ok(len)
    }
}

impl embedded_io_async::Write for ScriptedConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.wire.borrow_mut().output.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for ScriptedConnection {
    async fn close(self) {
        self.wire.borrow_mut().closed = true;
    }
}

/// Listener handing out queued connections. Accept never completes once the
/// queue is empty.
#[derive(Default)]
pub struct FakeListener {
    queue: VecDeque<ScriptedConnection>,
    /// Accepts that fail before the queue is served.
    pub accept_errors: usize,
}

impl FakeListener {
    pub fn with(connections: Vec<ScriptedConnection>) -> Self {
        Self {
            queue: connections.into(),
            accept_errors: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Listener for FakeListener {
    type Connection<'a> = ScriptedConnection;

    async fn accept(&mut self) -> Result<Self::Connection<'_>, NetError> {
        if self.accept_errors > 0 {
            self.accept_errors -= 1;
            return Err(NetError::Listen);
        }
        match self.queue.pop_front() {
            Some(conn) => Ok(conn),
            None => core::future::pending().await,
        }
    }
}

/// A request as the transport saw it.
pub struct SentRequest {
    pub url: String,
    pub api_key: String,
    pub body: String,
    pub timeout_ms: u64,
}

/// Transport replaying scripted outcomes. Runs out into timeouts.
pub struct FakeTransport {
    responses: VecDeque<Result<u16, UplinkError>>,
    pub sent: Vec<SentRequest>,
}

impl FakeTransport {
    pub fn responding(responses: &[Result<u16, UplinkError>]) -> Self {
        Self {
            responses: responses.iter().copied().collect(),
            sent: Vec::new(),
        }
    }
}

impl HttpTransport for FakeTransport {
    async fn post(&mut self, request: &InsertRequest<'_>) -> Result<u16, UplinkError> {
        self.sent.push(SentRequest {
            url: String::from(request.url),
            api_key: String::from(request.api_key),
            body: String::from(request.body),
            timeout_ms: request.timeout_ms,
        });
        self.responses
            .pop_front()
            .unwrap_or(Err(UplinkError::Net(NetError::Timeout)))
    }
}

/*** WiFi ***/

/// Station that connects after a configurable number of status polls.
#[derive(Default)]
pub struct FakeWifi {
    /// Connected before a connect was ever issued.
    pub already_connected: bool,
    /// Poll on which the station reports connected, `None` for never.
    pub connected_after: Option<usize>,
    pub fail_connect: bool,
    pub fail_access_point: bool,
    /// Clock advanced by the given milliseconds inside each connect call.
    pub slow_connect: Option<(FakeClock, u64)>,
    pub connect_calls: usize,
    pub polls: usize,
    pub joined: Option<Credentials>,
    pub access_point: Option<(String, String)>,
}

impl FakeWifi {
    pub fn connecting_after(polls: usize) -> Self {
        Self {
            connected_after: Some(polls),
            ..Self::default()
        }
    }

    pub fn never_connecting() -> Self {
        Self::default()
    }
}

impl WifiDriver for FakeWifi {
    async fn activate_station(&mut self) -> Result<(), WifiError> {
        Ok(())
    }

    fn is_station_connected(&mut self) -> bool {
        if self.already_connected {
            return true;
        }
        if self.connect_calls == 0 {
            return false;
        }
        self.polls += 1;
        self.connected_after.is_some_and(|n| self.polls >= n)
    }

    async fn connect_station(&mut self, credentials: &Credentials) -> Result<(), WifiError> {
        self.connect_calls += 1;
        if let Some((clock, ms)) = &self.slow_connect {
            clock.advance(*ms);
        }
        if self.fail_connect {
            return Err(WifiError::Station);
        }
        self.joined = Some(credentials.clone());
        Ok(())
    }

    fn station_address(&self) -> Option<Ipv4Addr> {
        self.joined.as_ref().map(|_| Ipv4Addr::new(10, 0, 0, 42))
    }

    async fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        if self.fail_access_point {
            return Err(WifiError::AccessPoint);
        }
        self.access_point = Some((String::from(ssid), String::from(password)));
        Ok(())
    }

    fn access_point_address(&self) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 4, 1)
    }
}

/*** Timing and GPIO ***/

/// Manually advanced millisecond clock.
#[derive(Clone, Default)]
pub struct FakeClock {
    now_ns: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now_ns.set(self.now_ns.get() + ms * 1_000_000);
    }

    /// A delay that moves this clock forward instead of sleeping.
    pub fn delay(&self) -> FakeDelay {
        FakeDelay {
            now_ns: self.now_ns.clone(),
            slept_ns: 0,
        }
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }
}

pub struct FakeDelay {
    now_ns: Rc<Cell<u64>>,
    slept_ns: u64,
}

impl FakeDelay {
    pub fn slept_ms(&self) -> u64 {
        self.slept_ns / 1_000_000
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ns));
        self.slept_ns += u64::from(ns);
    }

    async fn delay_ms(&mut self, ms: u32) {
        let ns = u64::from(ms) * 1_000_000;
        self.now_ns.set(self.now_ns.get() + ns);
        self.slept_ns += ns;
    }
}

/// Output pin recording every level it is driven to.
#[derive(Default)]
pub struct RecordingPin {
    pub levels: Vec<bool>,
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}
