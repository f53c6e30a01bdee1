//! Newsletter endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::form_body;
use crate::forms::{newsletter, SubmissionOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub token: String,
}

/// POST /api/newsletter
pub async fn subscribe(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> SubmissionOutcome {
    match form_body(body) {
        Ok(input) => newsletter::subscribe(&state, &input).await,
        Err(outcome) => outcome,
    }
}

/// GET /api/newsletter/confirm?token=
pub async fn confirm(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> SubmissionOutcome {
    newsletter::confirm(&state, &query.token).await
}

/// POST /api/newsletter/unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> SubmissionOutcome {
    match form_body(body) {
        Ok(input) => newsletter::unsubscribe(&state, &input).await,
        Err(outcome) => outcome,
    }
}

/// PATCH /api/newsletter/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> SubmissionOutcome {
    match form_body(body) {
        Ok(input) => newsletter::update_preferences(&state, &input).await,
        Err(outcome) => outcome,
    }
}
