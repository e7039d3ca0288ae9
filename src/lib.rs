//! Panic-button appliance firmware library.
//!
//! This library contains the platform-independent components — the
//! persisted settings store, the button gesture machine, the status
//! monitor, and the alert dispatcher — which can all be tested on the
//! host machine without device hardware. The ESP-IDF integration (WiFi,
//! NVS storage, OLED panel, SMTP transport) is gated behind the `esp32`
//! feature.

pub mod alert;
pub mod buttons;
pub mod identity;
#[cfg(feature = "esp32")]
pub mod mail;
#[cfg(feature = "esp32")]
pub mod net;
pub mod panel;
pub mod settings;
pub mod state;
pub mod status;
pub mod web;

// Re-export commonly used items
pub use alert::{dispatch, DispatchOutcome, MailTransport, MessageKind, SendOutcome};
pub use buttons::{ButtonEvent, ButtonMonitor, GestureKind};
pub use panel::{LedMode, StatusPanel};
pub use settings::{DeviceSettings, SettingsStore};
pub use state::DeviceState;
pub use status::{ConnectivityProbe, NetworkMode, StatusMonitor};

/// Firmware version reported on the status page.
pub const FIRMWARE_VERSION: &str = "1.0.0";
