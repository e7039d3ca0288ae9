//! Persisted device settings.
//!
//! The only manager of configuration data in the firmware: one fixed
//! record of device settings, validated at the setters, persisted as a
//! whole with an integrity sentinel, and restorable to factory defaults.
//!
//! # Components
//!
//! - [`config`] - the record itself: capacities, defaults, sentinel, wire
//!   format (host-testable)
//! - [`store`] - load/save/factory-reset over a storage-backend trait
//!   (host-testable via [`MemoryBackend`])
//! - [`nvs`] - the NVS backend (ESP32 only)

pub mod config;
pub mod store;

#[cfg(feature = "esp32")]
mod nvs;

pub use config::{ap_ssid, hostname, DeviceSettings, SettingsError};
pub use store::{MemoryBackend, SettingsBackend, SettingsStore};

#[cfg(feature = "esp32")]
pub use nvs::NvsBackend;
