//! SMTP delivery adapter over `lettre`.
//!
//! Thin transport boundary: everything SMTP lives in the client crate,
//! this module only maps the composed message and the relay coordinates
//! onto it and folds the result into the structured send outcome the
//! dispatcher interprets.
//!
//! Recipient addresses that fail to parse are counted as failed
//! deliveries rather than aborting the send, so one bad entry in the
//! configured list cannot silence the remaining recipients.

use crate::alert::{MailError, MailTransport, OutgoingMessage, RelayConfig, SendOutcome};
use crate::status::ConnectivityProbe;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use log::{info, warn};
use std::time::Duration;

/// Session timeout for connects and sends. Generous: the control loop
/// deliberately blocks for the duration of a send.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// `lettre`-backed mail transport and relay connectivity probe.
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn transport(&self, relay: &RelayConfig) -> SmtpTransport {
        SmtpTransport::builder_dangerous(relay.host.as_str())
            .port(relay.port)
            .credentials(Credentials::new(relay.user.clone(), relay.password.clone()))
            .timeout(Some(SMTP_TIMEOUT))
            .build()
    }
}

impl Default for SmtpMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl MailTransport for SmtpMailer {
    fn send(
        &mut self,
        relay: &RelayConfig,
        message: &OutgoingMessage,
    ) -> Result<SendOutcome, MailError> {
        let from_address: Address = message
            .from_email
            .parse()
            .map_err(|e| MailError::Compose(format!("bad from address: {}", e)))?;

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(message.from_name.clone()), from_address))
            .subject(message.subject.clone());

        let mut failed = 0usize;
        let mut accepted = 0usize;
        for recipient in &message.recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    accepted += 1;
                }
                Err(e) => {
                    warn!("skipping unparsable recipient '{}': {}", recipient, e);
                    failed += 1;
                }
            }
        }

        if accepted == 0 {
            return Ok(SendOutcome {
                completed: 0,
                failed,
            });
        }

        let email = builder
            .body(message.body.clone())
            .map_err(|e| MailError::Compose(e.to_string()))?;

        match self.transport(relay).send(&email) {
            Ok(response) => {
                info!("relay accepted submission: {:?}", response.code());
                Ok(SendOutcome {
                    completed: accepted,
                    failed,
                })
            }
            Err(e) => {
                // The submission as a whole failed; every parsed
                // recipient counts as undelivered.
                warn!("relay submission failed: {}", e);
                Ok(SendOutcome {
                    completed: 0,
                    failed: failed + accepted,
                })
            }
        }
    }
}

impl ConnectivityProbe for SmtpMailer {
    /// Open a relay session and close it again. Success only says the
    /// relay answers with these credentials right now.
    fn check(&mut self, relay: &RelayConfig) -> bool {
        self.transport(relay).test_connection().unwrap_or(false)
    }
}
