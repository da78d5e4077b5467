//! ESP32 firmware-specific modules for soilmon
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the esp-radio WiFi driver, embassy-net sockets, the ADC1 moisture
//! channel and the flash-backed credential record. Each module implements one
//! of the `soilmon_core` hardware traits.

#![no_std]

extern crate alloc;

pub mod adc;
pub mod app_state;
pub mod net;
pub mod time;
pub mod wifi;
