//! Transactional email through Resend.
//!
//! The provider allows two requests per second, so [`Mailer`] pauses for a
//! fixed delay after every attempt, failed or not. There is no retry; the
//! caller gets a [`SendResult`] in the provider's `{ success, data | error }`
//! shape and decides what to do.
//!
//! The HTTP side sits behind [`EmailTransport`] and the pause behind
//! [`Sleeper`], so both can be replaced in tests.

use crate::config::EmailConfig;
use pulldown_cmark::{Options, Parser, html};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const API_KEY_VAR: &str = "RESEND_API_KEY";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("RESEND_API_KEY is not configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the email ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// One outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Provider acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
}

/// Outcome of one send, never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SendReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delivers a message to the provider.
pub trait EmailTransport {
    fn send(&self, from: &str, message: &EmailMessage) -> Result<SendReceipt, MailError>;
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Resend's `POST /emails`.
#[derive(Debug)]
pub struct ResendTransport {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: Option<String>,
}

impl ResendTransport {
    /// A missing key is only a warning here; sends fail with
    /// [`MailError::MissingApiKey`].
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self, MailError> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("{API_KEY_VAR} is not configured");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
        })
    }

    /// Key from the `RESEND_API_KEY` environment variable.
    pub fn from_env(config: &EmailConfig) -> Result<Self, MailError> {
        Self::new(&config.api_url, std::env::var(API_KEY_VAR).ok())
    }
}

impl EmailTransport for ResendTransport {
    fn send(&self, from: &str, message: &EmailMessage) -> Result<SendReceipt, MailError> {
        let key = self.api_key.as_deref().ok_or(MailError::MissingApiKey)?;
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&SendRequest {
                from,
                to: [message.to.as_str()],
                subject: &message.subject,
                html: &message.html,
            })
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json()?)
    }
}

/// Blocks the current thread for a while.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Rate-limited sender.
#[derive(Debug)]
pub struct Mailer<T: EmailTransport, S: Sleeper = ThreadSleeper> {
    transport: T,
    sleeper: S,
    from: String,
    delay: Duration,
}

impl<T: EmailTransport> Mailer<T, ThreadSleeper> {
    pub fn new(transport: T, config: &EmailConfig) -> Self {
        Self::with_sleeper(transport, ThreadSleeper, config)
    }
}

impl<T: EmailTransport, S: Sleeper> Mailer<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, config: &EmailConfig) -> Self {
        Self {
            transport,
            sleeper,
            from: config.from.clone(),
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    pub fn send(&self, message: &EmailMessage) -> SendResult {
        let result = match self.transport.send(&self.from, message) {
            Ok(receipt) => {
                debug!(id = %receipt.id, to = %message.to, "email sent");
                SendResult {
                    success: true,
                    data: Some(receipt),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to send email: {e}");
                SendResult {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.sleeper.sleep(self.delay);
        result
    }
}

/// Render a markdown body to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
