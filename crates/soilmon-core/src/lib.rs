//! Hardware-independent core library for soilmon
//!
//! This crate contains all platform-agnostic logic for the soilmon soil
//! moisture telemetry device: the connectivity state machine, the credential
//! record format, sensor calibration, uplink request building, the provisioning
//! portal, the local status server and the cooperative main loop.
//!
//! Hardware is only reached through traits ([`connectivity::WifiDriver`],
//! [`net::Listener`], [`uplink::HttpTransport`], [`sensors::RawAdc`],
//! [`storage::RecordStorage`]), so everything here also runs on desktop hosts
//! (for the simulator and tests).
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32) and desktop hosts.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod connectivity;
pub mod net;
pub mod operational;
pub mod portal;
pub mod sensors;
pub mod status_server;
pub mod storage;
pub mod uplink;

#[cfg(test)]
pub(crate) mod test_support;
