//! Status panel abstraction: one line of status text plus the alert LED.
//!
//! The core components talk to [`StatusPanel`] so the gesture, status,
//! and alert logic can run in host tests against a recording fake. The
//! device implementation ([`oled`], ESP32 only) drives an SSD1306 over
//! I2C and a GPIO LED.
//!
//! LED flashing is not a timer interrupt: the control loop calls the
//! panel's `run` every tick and the [`FlashGate`] toggles the level once
//! a full second has elapsed, giving the ~1 Hz alert blink.

use std::time::{Duration, Instant};

#[cfg(feature = "esp32")]
pub mod oled;

/// What the alert LED should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    /// Steady off: nominal.
    Off,
    /// Steady on: fault.
    On,
    /// ~1 Hz blink: alert in progress.
    Flash,
}

/// One-line display plus LED, as seen by the core logic.
pub trait StatusPanel {
    /// Replace the display contents with the given single-line text.
    fn show(&mut self, text: &str);

    /// Switch the LED mode.
    fn led(&mut self, mode: LedMode);
}

/// Free-running toggle gated on one second of elapsed time.
///
/// `tick` returns the new LED level whenever it is time to change it,
/// and `None` between toggles.
#[derive(Debug)]
pub struct FlashGate {
    lit: bool,
    last_toggle: Option<Instant>,
}

impl FlashGate {
    pub fn new() -> Self {
        Self {
            lit: false,
            last_toggle: None,
        }
    }

    /// Advance the gate. The first tick turns the LED on immediately so
    /// the blink starts without a dead second.
    pub fn tick(&mut self, now: Instant) -> Option<bool> {
        match self.last_toggle {
            None => {
                self.lit = true;
                self.last_toggle = Some(now);
                Some(true)
            }
            Some(prev) if now.duration_since(prev) >= Duration::from_secs(1) => {
                self.lit = !self.lit;
                self.last_toggle = Some(now);
                Some(self.lit)
            }
            Some(_) => None,
        }
    }

    /// Forget the toggle history (called when leaving flash mode).
    pub fn reset(&mut self) {
        self.lit = false;
        self.last_toggle = None;
    }
}

impl Default for FlashGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Recording fake used by the host tests of the core components.
#[cfg(test)]
pub mod testing {
    use super::{LedMode, StatusPanel};

    #[derive(Debug, Default)]
    pub struct RecordingPanel {
        pub texts: Vec<String>,
        pub leds: Vec<LedMode>,
    }

    impl RecordingPanel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn last_text(&self) -> Option<&str> {
            self.texts.last().map(String::as_str)
        }

        pub fn last_led(&self) -> Option<LedMode> {
            self.leds.last().copied()
        }
    }

    impl StatusPanel for RecordingPanel {
        fn show(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }

        fn led(&mut self, mode: LedMode) {
            self.leds.push(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_flash_gate_first_tick_lights_immediately() {
        let mut gate = FlashGate::new();
        let t0 = Instant::now();
        assert_eq!(gate.tick(t0), Some(true));
    }

    #[test]
    fn test_flash_gate_holds_below_one_second() {
        let mut gate = FlashGate::new();
        let t0 = Instant::now();
        gate.tick(t0);
        assert_eq!(gate.tick(at(t0, 400)), None);
        assert_eq!(gate.tick(at(t0, 999)), None);
    }

    #[test]
    fn test_flash_gate_toggles_each_second() {
        let mut gate = FlashGate::new();
        let t0 = Instant::now();
        assert_eq!(gate.tick(t0), Some(true));
        assert_eq!(gate.tick(at(t0, 1000)), Some(false));
        assert_eq!(gate.tick(at(t0, 1500)), None);
        assert_eq!(gate.tick(at(t0, 2100)), Some(true));
    }

    #[test]
    fn test_flash_gate_reset_restarts_cycle() {
        let mut gate = FlashGate::new();
        let t0 = Instant::now();
        gate.tick(t0);
        gate.reset();
        assert_eq!(gate.tick(at(t0, 100)), Some(true));
    }
}
