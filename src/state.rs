//! Shared application state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::SiteConfig;
use crate::content::{ContentClient, HttpContentClient, MemoryContentStore};
use crate::email::{LogMailer, Mailer, ResendMailer};
use crate::error::ContentError;
use crate::forms::rate_limit::{MemoryRateLimiter, PgRateLimiter, RateLimiter};
use crate::forms::tokens::TokenIssuer;
use crate::marketing::{self, MarketingPlatform};

/// Collaborators are trait objects so tests can swap in recording doubles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub content: Arc<dyn ContentClient>,
    pub mailer: Arc<dyn Mailer>,
    pub marketing: Arc<dyn MarketingPlatform>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub tokens: TokenIssuer,
    pub db: Option<PgPool>,
}

impl AppState {
    /// Pick a real or fallback implementation for each collaborator.
    pub async fn from_config(config: SiteConfig, db: Option<PgPool>) -> Result<Self, ContentError> {
        let content: Arc<dyn ContentClient> = match (&config.content.project_id, &config.content.seed_path) {
            (Some(project_id), _) => {
                tracing::info!(%project_id, dataset = %config.content.dataset, "using Sanity content store");
                Arc::new(HttpContentClient::new(&config.content, project_id))
            }
            (None, Some(seed)) => Arc::new(MemoryContentStore::load(seed).await?),
            (None, None) => {
                tracing::warn!("SANITY_PROJECT_ID and CONTENT_SEED_PATH not set; content store is empty");
                Arc::new(MemoryContentStore::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email.resend_api_key {
            Some(key) => Arc::new(ResendMailer::new(key.clone())),
            None => {
                tracing::warn!("RESEND_API_KEY not set; emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let rate_limiter: Arc<dyn RateLimiter> = match &db {
            Some(pool) => Arc::new(PgRateLimiter::new(pool.clone())),
            None => {
                tracing::info!("No database; submission limits are per-process");
                Arc::new(MemoryRateLimiter::new())
            }
        };

        Ok(Self {
            tokens: TokenIssuer::new(&config.confirmation_secret),
            marketing: Arc::from(marketing::from_config(&config.marketing)),
            config: Arc::new(config),
            content,
            mailer,
            rate_limiter,
            db,
        })
    }
}
