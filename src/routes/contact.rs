//! POST /api/contact-us

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use super::form_body;
use crate::forms::{contact, SubmissionOutcome};
use crate::state::AppState;

pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> SubmissionOutcome {
    match form_body(body) {
        Ok(input) => contact::submit_contact_form(&state, &input).await,
        Err(outcome) => outcome,
    }
}
