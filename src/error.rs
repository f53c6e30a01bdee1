//! Error types shared across the content, email and form layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure talking to the content store.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("content store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode content store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("content store is read-only: {0}")]
    ReadOnly(&'static str),
}

/// Failure delivering to an outbound provider (email, marketing platform).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{provider} transport error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} rejected request with {status}: {body}")]
    Rejected {
        provider: &'static str,
        status: u16,
        body: String,
    },
}

/// Failure verifying a confirmation or unsubscribe token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature or expiry invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token issued for a different purpose")]
    WrongPurpose,

    #[error("token issued for a different email")]
    WrongSubject,
}

/// Anything that can fail inside a form submission after validation.
///
/// Never shown to the submitter; the handler logs it and answers with a
/// generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("could not build link: {0}")]
    Link(String),
}

/// Shared JSON error body for read endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by read-path route handlers.
///
/// Detail is logged server-side; only the generic message reaches the client.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    Internal {
        message: &'static str,
        source: ContentError,
    },
}

impl ApiError {
    pub fn internal(message: &'static str) -> impl FnOnce(ContentError) -> Self {
        move |source| Self::Internal { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Preview access requires authorization"),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            Self::Internal { message, source } => {
                tracing::error!(error = %source, "{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response()
    }
}
