//! Volatile device operating state.
//!
//! These flags live only in memory and are rebuilt at every boot; the
//! control loop owns the single instance and passes it to the polling
//! components by reference. No locking: everything runs on the one
//! control-loop thread.

/// Live operating flags for the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// The live panic flag. Seeded from the persisted record at boot and
    /// used by the control loop; the persisted copy is only a mirror.
    pub in_panic_mode: bool,
    /// Set while the device cannot confirm it is operational (running in
    /// setup mode, or the mail relay is unreachable).
    pub fault: bool,
    /// Set when the most recent alert send failed for at least one
    /// recipient. Retained for diagnostics; no retry is scheduled.
    pub last_send_error: bool,
}

impl DeviceState {
    /// Fresh state at boot, seeding the panic flag from persisted data.
    pub fn new(in_panic_mode: bool) -> Self {
        Self {
            in_panic_mode,
            fault: false,
            last_send_error: false,
        }
    }
}
