//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `soilmon_core` and
//! adds ESP32-specific hardware initialization.

mod hardware;

pub use hardware::*;

// Re-export all shared app state types from soilmon-core
pub use soilmon_core::app_state::*;
