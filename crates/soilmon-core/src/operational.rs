//! The operational loop: periodic sampling and upload, interleaved with the
//! status server, all on one task.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info};

use crate::app_state::{AppError, LastReading};
use crate::config::{LOOP_ERROR_BACKOFF_MS, LOOP_YIELD_MS, SAMPLING_INTERVAL_MS};
use crate::net::Listener;
use crate::sensors::{MoistureSensor, RawAdc, Reading};
use crate::status_server::StatusServer;
use crate::uplink::{HttpTransport, Uplink};

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

pub struct OperationalLoop<'a, A, T, L, P, C, D> {
    sensor: MoistureSensor<A>,
    uplink: Uplink<T>,
    status: StatusServer<L>,
    indicator: P,
    clock: C,
    delay: D,
    last: &'a LastReading,
    last_sample_ms: Option<u64>,
}

impl<'a, A, T, L, P, C, D> OperationalLoop<'a, A, T, L, P, C, D>
where
    A: RawAdc,
    T: HttpTransport,
    L: Listener,
    P: OutputPin,
    C: Clock,
    D: DelayNs,
{
    pub fn new(
        sensor: MoistureSensor<A>,
        uplink: Uplink<T>,
        status: StatusServer<L>,
        indicator: P,
        clock: C,
        delay: D,
        last: &'a LastReading,
    ) -> Self {
        Self {
            sensor,
            uplink,
            status,
            indicator,
            clock,
            delay,
            last,
            last_sample_ms: None,
        }
    }

    /// Run forever. Errors from a tick are logged and followed by a back-off.
    pub async fn run(&mut self) -> ! {
        info!("Operational loop running");
        loop {
            match self.tick().await {
                Ok(()) => self.delay.delay_ms(LOOP_YIELD_MS).await,
                Err(e) => {
                    error!("Main loop error: {}", e);
                    self.delay.delay_ms(LOOP_ERROR_BACKOFF_MS).await;
                }
            }
        }
    }

    /// One iteration: sample and upload if due, then serve at most one
    /// status client.
    pub async fn tick(&mut self) -> Result<(), AppError> {
        let now = self.clock.now_ms();
        let due = self
            .last_sample_ms
            .is_none_or(|last| now.saturating_sub(last) >= SAMPLING_INTERVAL_MS);

        if due {
            self.sample_and_upload().await?;
            // A failed read is retried after the error back-off.
            self.last_sample_ms = Some(now);
        }

        self.status.poll(self.last).await;
        Ok(())
    }

    async fn sample_and_upload(&mut self) -> Result<Reading, AppError> {
        let reading = self.sensor.read()?;
        self.last.store(reading);
        info!(
            "Moisture: {}% (raw={})",
            reading.moisture_percent, reading.raw_adc
        );

        self.indicator.set_high().map_err(|_| AppError::Indicator)?;
        let status = self
            .uplink
            .send(reading.moisture_percent, reading.raw_adc)
            .await;
        self.indicator.set_low().map_err(|_| AppError::Indicator)?;

        if status.is_none() {
            info!("Reading kept locally only");
        }
        Ok(reading)
    }

    pub fn last_sample_ms(&self) -> Option<u64> {
        self.last_sample_ms
    }

    pub fn uplink_mut(&mut self) -> &mut Uplink<T> {
        &mut self.uplink
    }
}
