//! Button gesture recognition.
//!
//! Interprets the raw PANIC and CANCEL input levels into hold-to-confirm
//! gestures. Each destructive action (triggering or canceling panic mode)
//! requires the button to stay held through a three-second countdown;
//! releasing early aborts with no state change. Holding both buttons
//! requests the device IP on the display.
//!
//! The machine is timestamp-driven: the control loop polls it every tick
//! with the current input levels and a timestamp, and acts on the
//! returned events. Nothing in here blocks, so the loop keeps servicing
//! the web endpoint and status checks during a countdown.
//!
//! The boot-time factory-reset gesture is separate: it is evaluated once,
//! synchronously, before the main loop starts (see the firmware binary).

use std::time::{Duration, Instant};

/// Seconds a button must stay held for a gesture to commit.
pub const HOLD_SECONDS: u64 = 3;

/// The two confirmable runtime gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// PANIC held alone while idle: arms panic mode and sends the alert.
    PanicTrigger,
    /// CANCEL held alone while in panic mode: clears panic mode and sends
    /// the cancellation notice.
    PanicCancel,
}

/// Events emitted by [`ButtonMonitor::poll`] for the control loop to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Both buttons went down: show the device IP until one releases.
    ShowIp,
    /// One of the two buttons released while the IP was showing.
    HideIp,
    /// A countdown step: `remaining` seconds left before commit.
    Countdown { kind: GestureKind, remaining: u8 },
    /// The countdown ran out while the button was still held.
    Committed(GestureKind),
    /// The button was released before the countdown ran out.
    Aborted(GestureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Idle,
    ShowingIp,
    Counting {
        kind: GestureKind,
        started: Instant,
        shown_remaining: u8,
    },
    /// A gesture committed; recognition stays blocked until the
    /// triggering button is released.
    WaitRelease(GestureKind),
}

/// Hold-to-confirm gesture state machine over the two inputs.
#[derive(Debug)]
pub struct ButtonMonitor {
    state: MonitorState,
}

impl ButtonMonitor {
    pub fn new() -> Self {
        Self {
            state: MonitorState::Idle,
        }
    }

    /// Advance the machine one tick.
    ///
    /// `panic` and `cancel` are the raw input levels (true = pressed),
    /// `in_panic` is the live panic flag, and `fault` suspends all
    /// gesture recognition — the display belongs to the fault indication
    /// while the device is signaling an internal problem.
    pub fn poll(
        &mut self,
        panic: bool,
        cancel: bool,
        in_panic: bool,
        fault: bool,
        now: Instant,
    ) -> Option<ButtonEvent> {
        if fault {
            self.state = MonitorState::Idle;
            return None;
        }

        match self.state {
            MonitorState::Idle => {
                if panic && cancel && !in_panic {
                    self.state = MonitorState::ShowingIp;
                    return Some(ButtonEvent::ShowIp);
                }
                let kind = if panic && !cancel && !in_panic {
                    GestureKind::PanicTrigger
                } else if cancel && !panic && in_panic {
                    GestureKind::PanicCancel
                } else {
                    return None;
                };
                self.state = MonitorState::Counting {
                    kind,
                    started: now,
                    shown_remaining: HOLD_SECONDS as u8,
                };
                Some(ButtonEvent::Countdown {
                    kind,
                    remaining: HOLD_SECONDS as u8,
                })
            }
            MonitorState::ShowingIp => {
                if panic && cancel {
                    None
                } else {
                    self.state = MonitorState::Idle;
                    Some(ButtonEvent::HideIp)
                }
            }
            MonitorState::Counting {
                kind,
                started,
                shown_remaining,
            } => {
                let held = match kind {
                    GestureKind::PanicTrigger => panic,
                    GestureKind::PanicCancel => cancel,
                };
                if !held {
                    self.state = MonitorState::Idle;
                    return Some(ButtonEvent::Aborted(kind));
                }

                let elapsed = now.duration_since(started);
                if elapsed >= Duration::from_secs(HOLD_SECONDS) {
                    self.state = MonitorState::WaitRelease(kind);
                    return Some(ButtonEvent::Committed(kind));
                }

                let remaining = (HOLD_SECONDS - elapsed.as_secs()) as u8;
                if remaining < shown_remaining {
                    self.state = MonitorState::Counting {
                        kind,
                        started,
                        shown_remaining: remaining,
                    };
                    return Some(ButtonEvent::Countdown { kind, remaining });
                }
                None
            }
            MonitorState::WaitRelease(kind) => {
                let held = match kind {
                    GestureKind::PanicTrigger => panic,
                    GestureKind::PanicCancel => cancel,
                };
                if !held {
                    self.state = MonitorState::Idle;
                }
                None
            }
        }
    }
}

impl Default for ButtonMonitor {
    fn default() -> Self {
        Self::new()
    }
}
