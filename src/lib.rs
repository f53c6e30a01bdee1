//! Equity by Design backend: content API and form submissions for the
//! marketing site.

pub mod config;
pub mod content;
pub mod db;
pub mod email;
pub mod error;
pub mod forms;
pub mod logging;
pub mod marketing;
pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, Method},
    middleware, Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::SiteConfig;
use logging::LogSettings;
use state::AppState;

/// Request bodies above this are rejected before reaching a handler.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, falling back to
/// the local Next.js dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    routes::api_router()
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(configure_cors())
}

/// Run the server (used by main).
pub async fn run() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background writers and loses buffered lines.
    let _log_guards = logging::init(&LogSettings::from_env());

    routes::health::init_start_time();

    let config = SiteConfig::from_env()?;

    let pool = match db::DbConfig::from_env() {
        Some(db_config) => match db::init_pool(&db_config).await {
            Ok(pool) => {
                db::run_migrations(&pool).await?;
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
                None
            }
        },
        None => {
            tracing::info!("DATABASE_URL not set. Running without database connection.");
            None
        }
    };

    let state = AppState::from_config(config, pool).await?;
    let app = create_app(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::state::testing::Harness;

    #[tokio::test]
    async fn test_app_sets_request_id() {
        let harness = Harness::new(vec![]);
        let res = create_app(harness.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let harness = Harness::new(vec![]);
        let body = format!("{{\"name\":\"{}\"}}", "x".repeat(MAX_BODY_BYTES + 1));
        let req = Request::post("/api/contact-us")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = create_app(harness.state.clone()).oneshot(req).await.unwrap();
        assert!(res.status().is_client_error());
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let harness = Harness::new(vec![]);
        let res = create_app(harness.state.clone())
            .oneshot(Request::get("/api/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
