//! HTTP route handlers and the shared helpers they use.

pub mod blog;
pub mod case_studies;
pub mod contact;
pub mod health;
pub mod newsletter;
pub mod services;
pub mod team;

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::forms::SubmissionOutcome;
use crate::state::AppState;

/// Every API and health route, before middleware and state.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/case-studies", get(case_studies::list_case_studies))
        .route("/api/case-studies/facets", get(case_studies::case_study_facets))
        .route("/api/case-studies/{slug}", get(case_studies::get_case_study))
        .route("/api/blog", get(blog::list_posts))
        .route("/api/blog/search", get(blog::search_posts))
        .route("/api/blog/{slug}", get(blog::get_post))
        .route("/api/services", get(services::list_services))
        .route("/api/services/{slug}", get(services::get_service))
        .route("/api/team", get(team::list_team))
        .route("/api/team/{slug}", get(team::get_team_member))
        .route("/api/contact-us", post(contact::submit))
        .route("/api/newsletter", post(newsletter::subscribe))
        .route("/api/newsletter/confirm", get(newsletter::confirm))
        .route("/api/newsletter/unsubscribe", post(newsletter::unsubscribe))
        .route(
            "/api/newsletter/preferences",
            axum::routing::patch(newsletter::update_preferences),
        )
        .route("/health", get(health::health_ping))
        .route("/health/ready", get(health::health_ready))
}

// ============================================================================
// Caching
// ============================================================================

/// Shared-cache lifetime for a public read endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub s_maxage: u32,
    pub stale_while_revalidate: u32,
}

/// Case studies, services and team change rarely.
pub const SLOW_CHANGING: CachePolicy = CachePolicy {
    s_maxage: 300,
    stale_while_revalidate: 600,
};

/// Blog content is edited and scheduled more often.
pub const BLOG: CachePolicy = CachePolicy {
    s_maxage: 60,
    stale_while_revalidate: 300,
};

impl CachePolicy {
    pub fn header_value(self, preview: bool) -> HeaderValue {
        if preview {
            return HeaderValue::from_static("no-cache");
        }
        let value = format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.s_maxage, self.stale_while_revalidate
        );
        HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("no-cache"))
    }
}

/// JSON body with the matching `Cache-Control` header.
pub fn cached<T: Serialize>(policy: CachePolicy, preview: bool, body: T) -> Response {
    (
        [(header::CACHE_CONTROL, policy.header_value(preview))],
        Json(body),
    )
        .into_response()
}

// ============================================================================
// Preview access
// ============================================================================

/// Whether draft content may be served for this request.
///
/// Asking for preview without `Authorization: Bearer <PREVIEW_SECRET>` is an
/// error rather than a silent downgrade.
pub fn authorize_preview(
    state: &AppState,
    headers: &HeaderMap,
    requested: bool,
) -> Result<bool, ApiError> {
    if !requested {
        return Ok(false);
    }
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (&state.config.preview_secret, presented) {
        (Some(secret), Some(token)) if !secret.is_empty() && token == secret => Ok(true),
        _ => {
            tracing::warn!("Preview requested without valid authorization");
            Err(ApiError::Unauthorized)
        }
    }
}

// ============================================================================
// Form bodies
// ============================================================================

const MALFORMED_BODY: &str = "Invalid request body";

/// Unwrap a JSON body, answering malformed input with the form envelope.
pub fn form_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, SubmissionOutcome> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::info!(error = %rejection, "Rejected form body");
        SubmissionOutcome::Rejected(MALFORMED_BODY)
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::Harness;

    #[test]
    fn test_cache_header_values() {
        assert_eq!(
            SLOW_CHANGING.header_value(false),
            "public, s-maxage=300, stale-while-revalidate=600"
        );
        assert_eq!(BLOG.header_value(false), "public, s-maxage=60, stale-while-revalidate=300");
        assert_eq!(BLOG.header_value(true), "no-cache");
    }

    #[test]
    fn test_preview_requires_secret() {
        let harness = Harness::new(vec![]);
        let mut headers = HeaderMap::new();
        assert!(!authorize_preview(&harness.state, &headers, false).unwrap());
        assert!(authorize_preview(&harness.state, &headers, true).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert!(authorize_preview(&harness.state, &headers, true).is_err());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer preview-secret"),
        );
        assert!(authorize_preview(&harness.state, &headers, true).unwrap());
    }
}
