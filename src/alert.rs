//! Alert composition and dispatch.
//!
//! Builds the three notification kinds from the settings record and hands
//! them to a [`MailTransport`] for delivery. The transport reports a
//! structured per-send outcome (how many recipients succeeded and failed)
//! synchronously, which this module interprets into display/LED signaling
//! and the volatile `last_send_error` flag.
//!
//! An alert that reaches only part of the recipient list chains exactly
//! one PARTIAL follow-up notification; the follow-up itself never chains
//! again, so a flaky relay cannot set off a notification storm. There is
//! no retry or backoff for failed sends.

use crate::panel::{LedMode, StatusPanel};
use crate::settings::DeviceSettings;
use crate::state::DeviceState;
use log::{error, info};
use std::fmt;

/// Body text for the partial-failure follow-up notification.
const PARTIAL_BODY: &str = "Not all recipients were able to receive the alert!\n\
                            You may want to take that into account with your response!!!";

/// Body text for the cancellation notification.
const CANCEL_BODY: &str = "The prior alert has been Canceled by the sender!";

/// The kinds of notification the device sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The panic alert itself.
    Alert,
    /// Follow-up warning that not every recipient got the alert.
    Partial,
    /// Notice that the sender canceled the prior alert.
    Cancel,
}

/// A composed notification ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
    pub from_name: String,
    pub from_email: String,
    pub recipients: Vec<String>,
}

/// Mail-relay coordinates, snapshotted from the settings record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl RelayConfig {
    pub fn from_settings(settings: &DeviceSettings) -> Self {
        Self {
            host: settings.smtp_host().to_string(),
            port: settings.smtp_port(),
            user: settings.smtp_user().to_string(),
            password: settings.smtp_password().to_string(),
        }
    }
}

/// Per-send delivery result: recipient counts, reported synchronously by
/// the transport once the send call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub completed: usize,
    pub failed: usize,
}

/// Errors from the mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    /// The message could not be constructed (bad address, etc).
    Compose(String),
    /// The relay session could not be established.
    Connect(String),
    /// The relay rejected the submission.
    Send(String),
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compose(msg) => write!(f, "message composition failed: {}", msg),
            Self::Connect(msg) => write!(f, "relay connection failed: {}", msg),
            Self::Send(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for MailError {}

/// Mail delivery boundary.
///
/// The firmware implements this over an SMTP client crate; host tests
/// script it. The send call blocks for the duration of the session and
/// returns the structured outcome — there is no callback and therefore
/// no re-entrancy into an in-flight session.
pub trait MailTransport {
    fn send(
        &mut self,
        relay: &RelayConfig,
        message: &OutgoingMessage,
    ) -> Result<SendOutcome, MailError>;
}

/// How a dispatch went, after interpreting the transport outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every recipient accepted.
    Delivered,
    /// Some recipients accepted, some failed.
    PartialFailure,
    /// No recipient accepted (or the session never came up).
    FullFailure,
}

/// Map the configured panic level onto its subject label.
///
/// Out-of-range levels keep the initial `TEST` default rather than
/// failing — a long-standing quirk the recipients may rely on.
pub fn panic_level_label(level: u8) -> &'static str {
    match level {
        1 => "TEST",
        2 => "INFORMATIONAL",
        3 => "WARNING",
        4 => "CRITICAL",
        5 => "EMERGENCY",
        _ => "TEST",
    }
}

/// Split the semicolon-delimited recipient field into clean addresses.
/// Entries are trimmed; empty segments are dropped.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compose the given notification kind from the settings record.
pub fn compose(kind: MessageKind, settings: &DeviceSettings) -> OutgoingMessage {
    let label = panic_level_label(settings.panic_level());
    let (subject, body) = match kind {
        MessageKind::Alert => (
            format!("{} Alert from: {}", label, settings.owner()),
            settings.message().to_string(),
        ),
        MessageKind::Partial => (
            format!("{} Alert from: {}", label, settings.owner()),
            PARTIAL_BODY.to_string(),
        ),
        MessageKind::Cancel => (
            format!("Canceled:{} Alert from: {}", label, settings.owner()),
            CANCEL_BODY.to_string(),
        ),
    };

    OutgoingMessage {
        subject,
        body,
        from_name: settings.from_name().to_string(),
        from_email: settings.from_email().to_string(),
        recipients: parse_recipients(settings.recipients()),
    }
}

/// Compose, send, and interpret one notification.
///
/// Alert and Partial outcomes update `last_send_error`; an Alert that
/// only partially delivered chains a single Partial follow-up. Cancel is
/// best-effort: whatever happens on the wire, the panic flag stays
/// cleared and the error flag is forced false afterwards.
pub fn dispatch(
    kind: MessageKind,
    settings: &DeviceSettings,
    transport: &mut dyn MailTransport,
    state: &mut DeviceState,
    panel: &mut dyn StatusPanel,
) -> DispatchOutcome {
    let outcome = send_once(kind, settings, transport, panel);

    match kind {
        MessageKind::Alert | MessageKind::Partial => {
            state.last_send_error = outcome != DispatchOutcome::Delivered;
        }
        MessageKind::Cancel => {}
    }

    if kind == MessageKind::Alert && outcome == DispatchOutcome::PartialFailure {
        // One follow-up hop only; the Partial path never chains again.
        let follow_up = send_once(MessageKind::Partial, settings, transport, panel);
        if follow_up != DispatchOutcome::Delivered {
            state.last_send_error = true;
        }
    }

    if kind == MessageKind::Cancel {
        state.last_send_error = false;
    }

    outcome
}

fn send_once(
    kind: MessageKind,
    settings: &DeviceSettings,
    transport: &mut dyn MailTransport,
    panel: &mut dyn StatusPanel,
) -> DispatchOutcome {
    let message = compose(kind, settings);
    let relay = RelayConfig::from_settings(settings);

    let outcome = match transport.send(&relay, &message) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:?} send failed: {}", kind, e);
            panel.show("Send Error!!!");
            panel.led(LedMode::On);
            return DispatchOutcome::FullFailure;
        }
    };

    info!(
        "{:?} send results: completed {}, failed {}",
        kind, outcome.completed, outcome.failed
    );

    if outcome.failed > 0 && outcome.completed == 0 {
        panel.show("Send Error!!!");
        panel.led(LedMode::On);
        DispatchOutcome::FullFailure
    } else if outcome.failed > 0 {
        panel.show("Partial Send!");
        panel.led(LedMode::Flash);
        DispatchOutcome::PartialFailure
    } else {
        match kind {
            MessageKind::Alert | MessageKind::Partial => panel.show("Alerts Sent!"),
            MessageKind::Cancel => panel.show("Cancel Sent!"),
        }
        panel.led(LedMode::Flash);
        DispatchOutcome::Delivered
    }
}
