//! Email marketing platform (ConvertKit) sync for newsletter subscribers.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::MarketingConfig;
use crate::error::DeliveryError;
use crate::forms::validation::{Frequency, NewsletterSubscription};

const CONVERTKIT_API: &str = "https://api.convertkit.com/v3";

/// Subscriber lifecycle as mirrored to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberStatus {
    Pending,
    Active,
    Unsubscribed,
}

impl SubscriberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Unsubscribed => "unsubscribed",
        }
    }
}

#[async_trait]
pub trait MarketingPlatform: Send + Sync {
    /// Register a new (pending) subscriber.
    async fn subscribe(&self, subscription: &NewsletterSubscription) -> Result<(), DeliveryError>;

    async fn set_status(&self, email: &str, status: SubscriberStatus) -> Result<(), DeliveryError>;

    async fn update_preferences(
        &self,
        email: &str,
        interests: Option<&[String]>,
        frequency: Option<Frequency>,
    ) -> Result<(), DeliveryError>;
}

/// ConvertKit v3 API. Subscribing to the form is an upsert keyed by email, so
/// status and preference changes are pushed as custom fields the same way.
pub struct ConvertKit {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    form_id: String,
}

impl ConvertKit {
    pub fn new(api_key: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: CONVERTKIT_API.to_string(),
            api_key: api_key.into(),
            form_id: form_id.into(),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), DeliveryError> {
        let response = request.send().await.map_err(|source| DeliveryError::Transport {
            provider: "convertkit",
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                provider: "convertkit",
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn upsert(
        &self,
        email: &str,
        first_name: Option<&str>,
        fields: Map<String, Value>,
    ) -> Result<(), DeliveryError> {
        let mut body = json!({
            "api_key": self.api_key,
            "email": email,
            "fields": fields,
        });
        if let Some(first_name) = first_name {
            body["first_name"] = json!(first_name);
        }
        let url = format!("{}/forms/{}/subscribe", self.base_url, self.form_id);
        self.send(self.http.post(url).json(&body)).await
    }
}

#[async_trait]
impl MarketingPlatform for ConvertKit {
    #[tracing::instrument(skip_all)]
    async fn subscribe(&self, subscription: &NewsletterSubscription) -> Result<(), DeliveryError> {
        let mut fields = Map::new();
        fields.insert("interests".into(), json!(subscription.interests.join(",")));
        if let Some(source) = &subscription.source {
            fields.insert("source".into(), json!(source));
        }
        fields.insert("newsletter_status".into(), json!(SubscriberStatus::Pending.as_str()));
        self.upsert(
            &subscription.email,
            subscription.first_name.as_deref(),
            fields,
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_status(&self, email: &str, status: SubscriberStatus) -> Result<(), DeliveryError> {
        if status == SubscriberStatus::Unsubscribed {
            let url = format!("{}/unsubscribe", self.base_url);
            let body = json!({ "api_secret": self.api_key, "email": email });
            return self.send(self.http.put(url).json(&body)).await;
        }
        let mut fields = Map::new();
        fields.insert("newsletter_status".into(), json!(status.as_str()));
        self.upsert(email, None, fields).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_preferences(
        &self,
        email: &str,
        interests: Option<&[String]>,
        frequency: Option<Frequency>,
    ) -> Result<(), DeliveryError> {
        let mut fields = Map::new();
        if let Some(interests) = interests {
            fields.insert("interests".into(), json!(interests.join(",")));
        }
        if let Some(frequency) = frequency {
            fields.insert("frequency".into(), json!(frequency));
        }
        if fields.is_empty() {
            return Ok(());
        }
        self.upsert(email, None, fields).await
    }
}

/// Used when ConvertKit is not configured; every call is a logged no-op.
pub struct DisabledMarketing;

#[async_trait]
impl MarketingPlatform for DisabledMarketing {
    async fn subscribe(&self, subscription: &NewsletterSubscription) -> Result<(), DeliveryError> {
        tracing::warn!(email = %subscription.email, "ConvertKit not configured, skipping subscribe");
        Ok(())
    }

    async fn set_status(&self, email: &str, status: SubscriberStatus) -> Result<(), DeliveryError> {
        tracing::debug!(%email, status = status.as_str(), "ConvertKit not configured, skipping status sync");
        Ok(())
    }

    async fn update_preferences(
        &self,
        email: &str,
        _interests: Option<&[String]>,
        _frequency: Option<Frequency>,
    ) -> Result<(), DeliveryError> {
        tracing::debug!(%email, "ConvertKit not configured, skipping preference sync");
        Ok(())
    }
}

/// Platform for the given settings: ConvertKit when key and form are present.
pub fn from_config(config: &MarketingConfig) -> Box<dyn MarketingPlatform> {
    match (&config.api_key, &config.form_id) {
        (Some(key), Some(form)) => Box::new(ConvertKit::new(key.clone(), form.clone())),
        _ => {
            tracing::warn!("CONVERTKIT_API_KEY / CONVERTKIT_FORM_ID not set; marketing sync disabled");
            Box::new(DisabledMarketing)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_marketing_is_noop() {
        let platform = from_config(&MarketingConfig {
            api_key: Some("key".to_string()),
            form_id: None,
        });
        assert!(platform
            .set_status("a@example.org", SubscriberStatus::Active)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_empty_preferences_skip_request() {
        let mut platform = ConvertKit::new("key", "123");
        platform.base_url = "http://127.0.0.1:9".to_string();
        assert!(platform
            .update_preferences("a@example.org", None, None)
            .await
            .is_ok());
        assert!(platform
            .update_preferences("a@example.org", None, Some(Frequency::Weekly))
            .await
            .is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(SubscriberStatus::Unsubscribed.as_str(), "unsubscribed");
    }
}
