//! Outbound notification dispatch.
//!
//! Registration, recovery, and approval flows hand a templated message to a
//! [`Notifier`], which delivers it on a detached task. Delivery is
//! fire-and-forget: the request that triggered the message never waits on or
//! fails because of it. The [`EmailSender`] trait is the transport seam; the
//! default [`LogEmailSender`] logs the payload, which is what local
//! development and tests want.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the failure gets logged.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Fire-and-forget dispatch handle shared across handlers.
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn EmailSender>,
}

impl Notifier {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Deliver on a detached task; failures are logged, never surfaced.
    pub fn dispatch(&self, message: EmailMessage) {
        let sender = Arc::clone(&self.sender);
        tokio::spawn(async move {
            if let Err(err) = sender.send(&message) {
                error!(
                    to_email = %message.to_email,
                    template = %message.template,
                    "failed to send notification: {err:#}"
                );
            }
        });
    }

    pub fn send_verification(&self, email: &str, first_name: &str, verify_url: &str) {
        self.dispatch_template(
            email,
            "verify_email",
            json!({
                "firstName": first_name,
                "verifyUrl": verify_url,
            }),
        );
    }

    pub fn send_registration_alert(&self, admin_email: &str, registrant_email: &str) {
        self.dispatch_template(
            admin_email,
            "registration_alert",
            json!({
                "registrantEmail": registrant_email,
            }),
        );
    }

    pub fn send_password_reset(&self, email: &str, first_name: &str, reset_url: &str) {
        self.dispatch_template(
            email,
            "password_reset",
            json!({
                "firstName": first_name,
                "resetUrl": reset_url,
            }),
        );
    }

    pub fn send_account_approved(&self, email: &str, first_name: &str, login_url: &str) {
        self.dispatch_template(
            email,
            "account_approved",
            json!({
                "firstName": first_name,
                "loginUrl": login_url,
            }),
        );
    }

    fn dispatch_template(&self, to_email: &str, template: &str, payload: serde_json::Value) {
        self.dispatch(EmailMessage {
            to_email: to_email.to_string(),
            template: template.to_string(),
            payload_json: payload.to_string(),
        });
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
