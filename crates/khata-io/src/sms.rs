//! Due reminders over SMS (Fast2SMS bulk API).

use khata_core::Money;
use std::time::Duration;
use thiserror::Error;

pub const FAST2SMS_ENDPOINT: &str = "https://www.fast2sms.com/dev/bulkV2";

#[derive(Error, Debug)]
pub enum SmsError {
    #[error("SMS gateway not configured (set KHATA_SMS_API_KEY)")]
    NotConfigured,
    #[error("SMS request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SMS gateway rejected the message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Gateway response for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    pub status: u16,
    pub body: String,
}

pub trait SmsGateway {
    fn send(&self, recipient: &str, message: &str) -> Result<SmsReceipt, SmsError>;
}

/// Reminder text for a customer's current total due.
pub fn due_message(name: &str, due: Money) -> String {
    format!("Namaste {name}, aapka baki paisa {due} rupaye hai. Kripya time se jama karein.")
}

/// Fixed sender/route settings for the Fast2SMS account.
#[derive(Debug, Clone)]
pub struct Fast2SmsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub sender_id: String,
    pub route: String,
    pub timeout: Duration,
}

pub struct Fast2Sms {
    config: Fast2SmsConfig,
    client: reqwest::blocking::Client,
}

impl Fast2Sms {
    pub fn new(config: Fast2SmsConfig) -> Result<Self, SmsError> {
        if config.api_key.trim().is_empty() {
            return Err(SmsError::NotConfigured);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn query<'a>(&'a self, recipient: &'a str, message: &'a str) -> [(&'static str, &'a str); 6] {
        [
            ("authorization", self.config.api_key.as_str()),
            ("route", self.config.route.as_str()),
            ("sender_id", self.config.sender_id.as_str()),
            ("message", message),
            ("numbers", recipient),
            ("flash", "0"),
        ]
    }
}

impl SmsGateway for Fast2Sms {
    fn send(&self, recipient: &str, message: &str) -> Result<SmsReceipt, SmsError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&self.query(recipient, message))
            .send()?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        tracing::info!(recipient, status = status.as_u16(), "SMS gateway responded");

        if status.is_success() {
            Ok(SmsReceipt {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(SmsError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
