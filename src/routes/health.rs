//! Liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Pin the uptime origin to process start rather than the first probe.
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Outcome of probing one dependency.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceCheck {
    fn healthy(elapsed: std::time::Duration) -> Self {
        Self {
            status: "healthy".to_string(),
            response_time: Some(elapsed.as_millis() as u64),
            error: None,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        Self {
            status: "unhealthy".to_string(),
            response_time: None,
            error: Some(error.to_string()),
        }
    }

    fn not_configured() -> Self {
        Self {
            status: "not configured".to_string(),
            response_time: None,
            error: None,
        }
    }

    fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyChecks {
    pub content: ServiceCheck,
    pub database: ServiceCheck,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/ready - 503 when the content store or a configured database is down.
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let content = match state.content.ping().await {
        Ok(elapsed) => ServiceCheck::healthy(elapsed),
        Err(e) => {
            tracing::warn!(error = %e, "Content store readiness check failed");
            ServiceCheck::unhealthy("content store unreachable")
        }
    };

    let database = match &state.db {
        Some(pool) => match crate::db::health_check(pool).await {
            Ok(elapsed) => ServiceCheck::healthy(elapsed),
            Err(e) => {
                tracing::warn!(error = %e, "Database readiness check failed");
                ServiceCheck::unhealthy("database unreachable")
            }
        },
        None => ServiceCheck::not_configured(),
    };

    let ready = !content.is_unhealthy() && !database.is_unhealthy();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not ready" }.to_string(),
            timestamp: Utc::now(),
            uptime: SERVER_START.elapsed().as_secs(),
            checks: ReadyChecks { content, database },
        }),
    )
}
