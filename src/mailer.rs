use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::{config::AppConfig, models::Employee};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail api rejected message with status {0}")]
    Rejected(u16),
    #[error("mail unavailable: {0}")]
    Unavailable(String),
}

/// Email
///
/// One outbound message. `to` may carry several recipients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Mailer
///
/// Outbound email transport. The HTTP implementation talks to a transactional mail
/// API; tests swap in `MockMailer` to read the codes that would have been sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

pub type MailerState = Arc<dyn Mailer>;

/// Picks the transport from configuration: HTTP when an endpoint and key are set,
/// log-only otherwise (only reachable in local mode, production fails at load).
pub fn from_config(config: &AppConfig) -> MailerState {
    match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(url, key, &config.mail_from)),
        _ => {
            tracing::warn!("MAIL_API_URL/MAIL_API_KEY not set, outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    }
}

/// HttpMailer
///
/// POSTs `{from, to, subject, html}` as JSON with a bearer API key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let body = OutgoingMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        tracing::info!(recipients = email.to.len(), subject = %email.subject, "mail sent");
        Ok(())
    }
}

/// LogMailer
///
/// Local-development transport. The body goes to `debug` so that OTP codes can be
/// read from the console.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(to = ?email.to, subject = %email.subject, "mail transport disabled, message logged");
        tracing::debug!(html = %email.html, "message body");
        Ok(())
    }
}

/// MockMailer
///
/// Records every message for assertions.
#[derive(Clone, Default)]
pub struct MockMailer {
    /// When true, `send` fails like an unreachable API.
    pub should_fail: bool,
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, recipient: &str) -> Option<Email> {
        self.sent()
            .into_iter()
            .rev()
            .find(|e| e.to.iter().any(|to| to == recipient))
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Unavailable("Mock Mailer Error".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| MailError::Unavailable(e.to_string()))?
            .push(email);
        Ok(())
    }
}

// --- Message builders ---

/// Why a code is being sent; only changes the wording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OtpPurpose {
    Registration,
    Login,
}

pub fn otp_email(to: &str, code: &str, purpose: OtpPurpose) -> Email {
    let (subject, heading) = match purpose {
        OtpPurpose::Registration => ("Verification code", "Welcome!"),
        OtpPurpose::Login => ("Your login code", "Sign in"),
    };

    Email {
        to: vec![to.to_string()],
        subject: subject.to_string(),
        html: format!(
            "<h2>{}</h2><p>Your one-time code: <strong>{}</strong></p><p>Valid for 10 minutes.</p>",
            heading, code
        ),
    }
}

pub fn new_employee_email(recipients: Vec<String>, employee: &Employee) -> Email {
    Email {
        to: recipients,
        subject: format!("New employee: {}", employee.name),
        html: format!(
            "<h2>New employee</h2><p>{} ({})</p>",
            employee.name, employee.email
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_messages() {
        let mailer = MockMailer::new();
        mailer
            .send(otp_email("a@example.com", "123456", OtpPurpose::Login))
            .await
            .unwrap();

        let last = mailer.last_to("a@example.com").unwrap();
        assert!(last.html.contains("123456"));
        assert!(mailer.last_to("b@example.com").is_none());
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mailer = MockMailer::new_failing();
        let result = mailer
            .send(otp_email("a@example.com", "1", OtpPurpose::Registration))
            .await;
        assert!(matches!(result, Err(MailError::Unavailable(_))));
        assert!(mailer.sent().is_empty());
    }
}
