//! Email channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{NotificationChannel, Notifier, NotifyError};
use crate::api::{Booking, Notification};

/// SMTP relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Envelope and header sender.
    pub sender: String,
}

impl SmtpConfig {
    /// Read `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASSWORD` and
    /// `SMTP_SENDER` through `lookup`. The port defaults to 587.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).unwrap_or_default();

        Self {
            host: var("SMTP_HOST"),
            port: lookup("SMTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            username: var("SMTP_USER"),
            password: var("SMTP_PASSWORD"),
            sender: var("SMTP_SENDER"),
        }
    }

    /// `host:port` relay address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl EmailMessage {
    /// Pre-expiry notice for `booking`, `minutes` before it ends.
    pub fn expiry_notice(booking: &Booking, minutes: i64, sender: &str, recipient: &str) -> Self {
        let resource = &booking.spec.resource_name;
        let tail = "Please, extend the booking if you want to keep the resource instances running.";

        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            subject: format!("Notice: Your resource instances will be stopped in {minutes} minutes."),
            text_body: format!(
                "Your booking for resource {resource} expires in {minutes} minutes and the resource will be stopped. {tail}"
            ),
            html_body: format!(
                "<p>Your booking for resource <strong>{resource}</strong> expires in {minutes} minutes and the resource will be stopped. {tail}</p>"
            ),
        }
    }

    /// Plain-text wire form with CRLF line endings.
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}\r\n",
            self.sender, self.recipient, self.subject, self.text_body
        )
    }
}

/// Delivers composed messages.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, smtp: &SmtpConfig, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Transport that only logs the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, smtp: &SmtpConfig, message: &EmailMessage) -> Result<(), NotifyError> {
        info!(
            relay = %smtp.address(),
            recipient = %message.recipient,
            subject = %message.subject,
            bytes = message.to_rfc822().len(),
            "Email notification"
        );
        Ok(())
    }
}

/// The `email` notification channel.
pub struct EmailChannel {
    smtp: SmtpConfig,
    transport: Arc<dyn MailTransport>,
    lead_minutes: i64,
}

impl EmailChannel {
    pub fn new(smtp: SmtpConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            smtp,
            transport,
            lead_minutes: 20,
        }
    }

    /// Minutes before expiry quoted in the notice.
    pub fn with_lead_minutes(mut self, minutes: i64) -> Self {
        self.lead_minutes = minutes;
        self
    }
}

impl NotificationChannel for EmailChannel {
    fn prepare(&self, booking: &Booking, target: &Notification) -> Box<dyn Notifier> {
        Box::new(EmailNotifier {
            message: EmailMessage::expiry_notice(
                booking,
                self.lead_minutes,
                &self.smtp.sender,
                &target.recipient,
            ),
            smtp: self.smtp.clone(),
            transport: Arc::clone(&self.transport),
        })
    }
}

struct EmailNotifier {
    message: EmailMessage,
    smtp: SmtpConfig,
    transport: Arc<dyn MailTransport>,
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self) -> Result<(), NotifyError> {
        let recipient = self.message.recipient.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(NotifyError::InvalidRecipient(self.message.recipient.clone()));
        }

        self.transport.deliver(&self.smtp, &self.message).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::{BookingSpec, Object, ObjectMeta};

    #[derive(Default)]
    struct Outbox(Mutex<Vec<EmailMessage>>);

    #[async_trait]
    impl MailTransport for Outbox {
        async fn deliver(&self, _smtp: &SmtpConfig, message: &EmailMessage) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "mail.local".into(),
            port: 25,
            username: String::new(),
            password: String::new(),
            sender: "ops@example.com".into(),
        }
    }

    fn booking() -> Booking {
        Object::new(
            ObjectMeta::new("default", "b1"),
            BookingSpec {
                start_at: "2026-01-01T00:00:00Z".into(),
                end_at: "2026-01-01T01:00:00Z".into(),
                resource_name: "analytics".into(),
                user_id: "alice".into(),
                notifications: vec![],
            },
        )
    }

    #[test]
    fn test_notice_wire_form() {
        let msg = EmailMessage::expiry_notice(&booking(), 20, "ops@example.com", "a@x.io");
        let wire = msg.to_rfc822();

        assert!(wire.starts_with("From: ops@example.com\r\nTo: a@x.io\r\n"));
        assert!(wire.contains(
            "Subject: Notice: Your resource instances will be stopped in 20 minutes.\r\n\r\n"
        ));
        assert!(wire.ends_with("keep the resource instances running.\r\n"));
        assert!(msg.html_body.contains("<strong>analytics</strong>"));
    }

    #[tokio::test]
    async fn test_channel_delivers_through_transport() {
        let outbox = Arc::new(Outbox::default());
        let channel = EmailChannel::new(smtp(), outbox.clone());
        let target = Notification {
            channel: "email".into(),
            recipient: "a@x.io".into(),
        };

        channel.prepare(&booking(), &target).send().await.unwrap();

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender, "ops@example.com");
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let outbox = Arc::new(Outbox::default());
        let channel = EmailChannel::new(smtp(), outbox.clone());
        let target = Notification {
            channel: "email".into(),
            recipient: "nobody".into(),
        };

        let err = channel.prepare(&booking(), &target).send().await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidRecipient(_)));
        assert!(outbox.0.lock().unwrap().is_empty());
    }
}
