//! Site configuration, read once from the environment at start-up.

use std::time::Duration;

/// Value shipped in `.env.example`; never acceptable in production.
pub const DEFAULT_CONFIRMATION_SECRET: &str = "default-confirmation-secret-change-in-production";

/// Content store (Sanity) connection settings.
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// Project id. `None` means run against the in-memory store.
    pub project_id: Option<String>,
    pub dataset: String,
    pub api_version: String,
    pub read_token: Option<String>,
    pub write_token: Option<String>,
    pub use_cdn: bool,
    /// JSON or NDJSON export loaded into the in-memory store.
    pub seed_path: Option<String>,
}

/// Transactional email settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub from: String,
    pub notifications_from: String,
    pub internal_recipient: String,
}

/// Marketing platform (ConvertKit) settings.
#[derive(Debug, Clone)]
pub struct MarketingConfig {
    pub api_key: Option<String>,
    pub form_id: Option<String>,
}

impl MarketingConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.form_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_submissions: u32,
    pub window: Duration,
}

/// Everything the service needs, constructed once and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub environment: String,
    pub site_url: String,
    pub confirmation_secret: String,
    pub preview_secret: Option<String>,
    pub content: ContentStoreConfig,
    pub email: EmailConfig,
    pub marketing: MarketingConfig,
    pub contact_rate_limit: RateLimitConfig,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        _ => default,
    }
}

impl SiteConfig {
    /// Build the configuration from environment variables.
    ///
    /// Fails only when running in production with an unusable confirmation
    /// secret; every other variable has a development default.
    pub fn from_env() -> Result<Self, String> {
        let environment = env_or("ENVIRONMENT", "development");
        let is_production = environment == "production";

        let confirmation_secret = env_or("CONFIRMATION_SECRET", DEFAULT_CONFIRMATION_SECRET);
        if is_production && confirmation_secret == DEFAULT_CONFIRMATION_SECRET {
            return Err(
                "CONFIRMATION_SECRET must be set to a secure, unique value in production"
                    .to_string(),
            );
        }

        let config = Self {
            site_url: env_or("SITE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            confirmation_secret,
            preview_secret: env_opt("PREVIEW_SECRET"),
            content: ContentStoreConfig {
                project_id: env_opt("SANITY_PROJECT_ID"),
                dataset: env_or("SANITY_DATASET", "production"),
                api_version: env_or("SANITY_API_VERSION", "2024-01-01"),
                read_token: env_opt("SANITY_API_TOKEN"),
                write_token: env_opt("SANITY_API_WRITE_TOKEN"),
                use_cdn: env_flag("SANITY_USE_CDN", is_production),
                seed_path: env_opt("CONTENT_SEED_PATH"),
            },
            email: EmailConfig {
                resend_api_key: env_opt("RESEND_API_KEY"),
                from: env_or("EMAIL_FROM", "Equity by Design <hello@equitybydesign.com>"),
                notifications_from: env_or(
                    "EMAIL_NOTIFICATIONS_FROM",
                    "Contact Form <notifications@equitybydesign.com>",
                ),
                internal_recipient: env_or(
                    "INTERNAL_NOTIFICATION_EMAIL",
                    "team@equitybydesign.com",
                ),
            },
            marketing: MarketingConfig {
                api_key: env_opt("CONVERTKIT_API_KEY"),
                form_id: env_opt("CONVERTKIT_FORM_ID"),
            },
            contact_rate_limit: RateLimitConfig {
                max_submissions: env_parse("CONTACT_RATE_LIMIT_MAX", 3),
                window: Duration::from_secs(env_parse("CONTACT_RATE_LIMIT_WINDOW_SECS", 3600)),
            },
            environment,
        };

        tracing::info!(
            environment = %config.environment,
            site_url = %config.site_url,
            content_project = ?config.content.project_id,
            dataset = %config.content.dataset,
            use_cdn = config.content.use_cdn,
            email_configured = config.email.resend_api_key.is_some(),
            marketing_configured = config.marketing.is_configured(),
            "site configuration loaded"
        );

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Development defaults with no external collaborators configured.
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            site_url: "https://equitybydesign.test".to_string(),
            confirmation_secret: "test-confirmation-secret".to_string(),
            preview_secret: Some("preview-secret".to_string()),
            content: ContentStoreConfig {
                project_id: None,
                dataset: "production".to_string(),
                api_version: "2024-01-01".to_string(),
                read_token: None,
                write_token: None,
                use_cdn: false,
                seed_path: None,
            },
            email: EmailConfig {
                resend_api_key: None,
                from: "Equity by Design <hello@equitybydesign.com>".to_string(),
                notifications_from: "Contact Form <notifications@equitybydesign.com>"
                    .to_string(),
                internal_recipient: "team@equitybydesign.com".to_string(),
            },
            marketing: MarketingConfig {
                api_key: None,
                form_id: None,
            },
            contact_rate_limit: RateLimitConfig {
                max_submissions: 3,
                window: Duration::from_secs(3600),
            },
        }
    }
}
