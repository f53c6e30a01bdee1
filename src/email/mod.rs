//! Transactional email delivery.

pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::error::DeliveryError;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// Resend HTTP API.
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[tracing::instrument(skip_all, fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let transport = |source| DeliveryError::Transport {
            provider: "resend",
            source,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": message.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
            }))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                provider: "resend",
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("email sent");
        Ok(())
    }
}

/// Stand-in used when no provider key is configured: messages are logged,
/// never delivered.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tracing::warn!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "RESEND_API_KEY not set; email logged instead of sent"
        );
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "Equity by Design <hello@equitybydesign.com>".to_string(),
            to: "reader@example.org".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        assert!(LogMailer.send(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_resend_transport_error_is_reported() {
        let mut mailer = ResendMailer::new("re_test");
        mailer.endpoint = "http://127.0.0.1:9/emails".to_string();
        let err = mailer.send(&message()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport { provider: "resend", .. }));
    }
}
