//! Periodic device status verification.
//!
//! While the device is not in panic mode this monitor keeps the user
//! informed: a unit still waiting for network configuration shows a
//! one-time setup fault, and a configured unit probes the mail relay
//! every two minutes to confirm the alert path is alive. The probe opens
//! and immediately closes a real relay session — a liveness heuristic,
//! not a deliverability guarantee.
//!
//! Between probes the healthy status line is repainted on a light
//! cadence so transient writes (countdown text, IP display) do not leave
//! the screen stale.

use crate::alert::RelayConfig;
use crate::panel::{LedMode, StatusPanel};
use crate::settings::DeviceSettings;
use crate::state::DeviceState;
use log::{info, warn};
use std::time::{Duration, Instant};

/// How often the mail relay is probed.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(120);

/// How often the healthy status line is repainted between probes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3);

/// How the device is attached to the network, decided once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// Running the local setup access point; no network assigned.
    AccessPoint,
    /// Joined to the configured network.
    Station,
}

/// Connectivity check against the configured mail relay.
///
/// Side-effecting: implementations open a real session and close it
/// again. The firmware backs this with the SMTP adapter; tests script it.
pub trait ConnectivityProbe {
    fn check(&mut self, relay: &RelayConfig) -> bool;
}

/// Fault/status poller, run every control-loop tick.
#[derive(Debug)]
pub struct StatusMonitor {
    mode: NetworkMode,
    last_probe: Option<Instant>,
    last_refresh: Option<Instant>,
}

impl StatusMonitor {
    pub fn new(mode: NetworkMode) -> Self {
        Self {
            mode,
            last_probe: None,
            last_refresh: None,
        }
    }

    /// Advance one tick.
    ///
    /// Suspended entirely while panic mode is active: the display and LED
    /// belong to the alert lifecycle then.
    pub fn tick(
        &mut self,
        state: &mut DeviceState,
        settings: &DeviceSettings,
        probe: &mut dyn ConnectivityProbe,
        panel: &mut dyn StatusPanel,
        now: Instant,
    ) {
        if state.in_panic_mode {
            return;
        }

        match self.mode {
            NetworkMode::AccessPoint => {
                // One-time transition: an unconfigured device is a fault
                // condition until someone completes setup.
                if !state.fault {
                    warn!("no network assigned, device requires setup");
                    panel.show("Setup Required!");
                    panel.led(LedMode::On);
                    state.fault = true;
                }
            }
            NetworkMode::Station => {
                let due = match self.last_probe {
                    None => true,
                    Some(at) => now.duration_since(at) >= PROBE_INTERVAL,
                };

                if due {
                    if probe.check(&RelayConfig::from_settings(settings)) {
                        panel.show("System Ready.");
                        panel.led(LedMode::Off);
                        state.fault = false;
                        self.last_refresh = Some(now);
                    } else if !state.fault {
                        warn!("mail relay unreachable, flagging fault");
                        panel.show("Internet Down?");
                        panel.led(LedMode::On);
                        state.fault = true;
                    } else {
                        info!("mail relay still unreachable");
                    }
                    self.last_probe = Some(now);
                } else if !state.fault {
                    let stale = match self.last_refresh {
                        None => true,
                        Some(at) => now.duration_since(at) >= REFRESH_INTERVAL,
                    };
                    if stale {
                        panel.show("System Ready.");
                        self.last_refresh = Some(now);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::testing::RecordingPanel;

    struct ScriptedProbe {
        results: Vec<bool>,
        checks: usize,
    }

    impl ScriptedProbe {
        fn new(results: Vec<bool>) -> Self {
            Self { results, checks: 0 }
        }
    }

    impl ConnectivityProbe for ScriptedProbe {
        fn check(&mut self, _relay: &RelayConfig) -> bool {
            let result = self.results[self.checks.min(self.results.len() - 1)];
            self.checks += 1;
            result
        }
    }

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    // ==================== Access-Point Mode Tests ====================

    #[test]
    fn test_ap_mode_flags_fault_once() {
        let mut monitor = StatusMonitor::new(NetworkMode::AccessPoint);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![true]);
        let mut panel = RecordingPanel::new();
        let t0 = Instant::now();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, t0);
        assert!(state.fault);
        assert_eq!(panel.last_text(), Some("Setup Required!"));
        assert_eq!(panel.last_led(), Some(LedMode::On));

        // Second tick: no repeated display churn, no probing.
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 1));
        assert_eq!(panel.texts.len(), 1);
        assert_eq!(probe.checks, 0);
    }

    // ==================== Station Mode Tests ====================

    #[test]
    fn test_first_tick_probes_and_reports_ready() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![true]);
        let mut panel = RecordingPanel::new();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, Instant::now());
        assert_eq!(probe.checks, 1);
        assert!(!state.fault);
        assert_eq!(panel.last_text(), Some("System Ready."));
        assert_eq!(panel.last_led(), Some(LedMode::Off));
    }

    #[test]
    fn test_probe_cadence_is_two_minutes() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![true]);
        let mut panel = RecordingPanel::new();
        let t0 = Instant::now();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, t0);
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 60));
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 119));
        assert_eq!(probe.checks, 1);

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 120));
        assert_eq!(probe.checks, 2);
    }

    #[test]
    fn test_failure_transitions_display_once() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![false]);
        let mut panel = RecordingPanel::new();
        let t0 = Instant::now();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, t0);
        assert!(state.fault);
        assert_eq!(panel.last_text(), Some("Internet Down?"));
        assert_eq!(panel.last_led(), Some(LedMode::On));
        let writes = panel.texts.len();

        // Still failing two minutes later: fault already shown, so the
        // display is not rewritten.
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 120));
        assert_eq!(probe.checks, 2);
        assert_eq!(panel.texts.len(), writes);
    }

    #[test]
    fn test_recovery_clears_fault() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![false, true]);
        let mut panel = RecordingPanel::new();
        let t0 = Instant::now();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, t0);
        assert!(state.fault);

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 120));
        assert!(!state.fault);
        assert_eq!(panel.last_text(), Some("System Ready."));
        assert_eq!(panel.last_led(), Some(LedMode::Off));
    }

    #[test]
    fn test_ready_line_refreshes_between_probes() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(false);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![true]);
        let mut panel = RecordingPanel::new();
        let t0 = Instant::now();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, t0);
        let after_probe = panel.texts.len();

        // Within the refresh window: nothing repainted.
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 2));
        assert_eq!(panel.texts.len(), after_probe);

        // Past it: the ready line is repainted without another probe.
        monitor.tick(&mut state, &settings, &mut probe, &mut panel, at(t0, 4));
        assert_eq!(panel.texts.len(), after_probe + 1);
        assert_eq!(panel.last_text(), Some("System Ready."));
        assert_eq!(probe.checks, 1);
    }

    #[test]
    fn test_suspended_in_panic_mode() {
        let mut monitor = StatusMonitor::new(NetworkMode::Station);
        let mut state = DeviceState::new(true);
        let settings = DeviceSettings::factory();
        let mut probe = ScriptedProbe::new(vec![true]);
        let mut panel = RecordingPanel::new();

        monitor.tick(&mut state, &settings, &mut probe, &mut panel, Instant::now());
        assert_eq!(probe.checks, 0);
        assert!(panel.texts.is_empty());
    }
}
