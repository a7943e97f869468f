//! Email notification for monthly decisions.
//!
//! Delivers the rendered report through the Resend HTTP API. Without an API
//! key the send is skipped and reported with the receipt id `"skipped"`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use gem_common::EmailConfig;

/// Receipt id returned when delivery is skipped for lack of credentials
pub const SKIPPED_RECEIPT_ID: &str = "skipped";

/// Outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryReceipt {
    pub id: String,
}

impl DeliveryReceipt {
    pub fn skipped() -> Self {
        Self {
            id: SKIPPED_RECEIPT_ID.to_string(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.id == SKIPPED_RECEIPT_ID
    }
}

/// Notification delivery errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NotifyError {
    /// Transport failures, throttling and server errors are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Delivery channel for decision reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, NotifyError>;
}

// ============================================================================
// Resend
// ============================================================================

/// Resend (`POST {api_url}/emails`) notifier.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    retry_count: u32,
    retry_delay: Duration,
}

impl ResendNotifier {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        let mut notifier = Self::new(&config.api_url, config.api_key.clone())
            .with_retry_count(config.retry_count);
        notifier.client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        notifier
    }

    /// Attempts per message, at least one
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.max(1);
        self
    }

    /// Base backoff; attempt `n` waits `n × delay` before the next try
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn try_send(
        &self,
        api_key: &str,
        message: &EmailMessage,
    ) -> Result<DeliveryReceipt, NotifyError> {
        let url = format!("{}/emails", self.api_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Network("Request timeout".into())
                } else if e.is_connect() {
                    NotifyError::Network("Connection failed".into())
                } else {
                    NotifyError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DeliveryReceipt>()
            .await
            .map_err(|e| NotifyError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, NotifyError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("RESEND_API_KEY not set, skipping email");
            return Ok(DeliveryReceipt::skipped());
        };

        let mut attempt = 1;
        loop {
            match self.try_send(api_key, message).await {
                Ok(receipt) => {
                    tracing::info!(
                        id = %receipt.id,
                        to = ?message.to,
                        subject = %message.subject,
                        "Email sent successfully"
                    );
                    return Ok(receipt);
                }
                Err(e) if e.is_retryable() && attempt < self.retry_count => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to send email, retrying..."
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Failed to send email");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "gem@example.com".into(),
            to: vec!["me@example.com".into()],
            subject: "GEM ETF Decision - 2024-02 (RISK-ON)".into(),
            text: "body".into(),
            html: "<p>body</p>".into(),
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NotifyError::Network("reset".into()).is_retryable());
        assert!(NotifyError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(NotifyError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!NotifyError::Http { status: 422, body: String::new() }.is_retryable());
        assert!(!NotifyError::InvalidResponse("eof".into()).is_retryable());
    }

    #[test]
    fn test_message_payload_shape() {
        let json = serde_json::to_value(message()).unwrap();
        assert_eq!(json["to"][0], "me@example.com");
        assert_eq!(json["from"], "gem@example.com");
        assert!(json["html"].as_str().unwrap().starts_with("<p>"));
    }

    #[tokio::test]
    async fn test_send_without_key_is_skipped() {
        let notifier = ResendNotifier::new("http://127.0.0.1:9", Some(String::new()));

        let receipt = notifier.send(&message()).await.unwrap();
        assert!(receipt.is_skipped());
    }

    #[test]
    fn test_retry_count_floor() {
        let config = EmailConfig {
            retry_count: 0,
            ..EmailConfig::default()
        };
        let notifier = ResendNotifier::from_config(&config);
        assert_eq!(notifier.retry_count, 1);
    }
}
