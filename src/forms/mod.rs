//! Public form submissions: contact inquiries and the newsletter lifecycle.

pub mod contact;
pub mod newsletter;
pub mod rate_limit;
pub mod tokens;
pub mod validation;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use validation::FieldErrors;

/// Extra flag carried on a successful newsletter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    AlreadySubscribed,
    RequiresConfirmation,
}

/// Result of a form handler. Never carries internal error detail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted {
        message: &'static str,
        notice: Option<Notice>,
    },
    /// Failed validation; `field_errors` names every offending field.
    Invalid {
        error: &'static str,
        field_errors: FieldErrors,
    },
    /// Spam, rate limit or a bad link. No side effects happened.
    Rejected(&'static str),
    /// Something downstream broke; already logged.
    Failed(&'static str),
}

impl SubmissionOutcome {
    pub fn accepted(message: &'static str) -> Self {
        Self::Accepted {
            message,
            notice: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Accepted { .. } => StatusCode::OK,
            Self::Invalid { .. } | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire envelope shared by every form endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_subscribed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
}

impl From<SubmissionOutcome> for SubmissionResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        let mut response = Self {
            success: outcome.is_success(),
            message: None,
            error: None,
            field_errors: None,
            already_subscribed: None,
            requires_confirmation: None,
        };
        match outcome {
            SubmissionOutcome::Accepted { message, notice } => {
                response.message = Some(message);
                match notice {
                    Some(Notice::AlreadySubscribed) => response.already_subscribed = Some(true),
                    Some(Notice::RequiresConfirmation) => {
                        response.requires_confirmation = Some(true)
                    }
                    None => {}
                }
            }
            SubmissionOutcome::Invalid {
                error,
                field_errors,
            } => {
                response.error = Some(error);
                response.field_errors = Some(field_errors);
            }
            SubmissionOutcome::Rejected(error) | SubmissionOutcome::Failed(error) => {
                response.error = Some(error);
            }
        }
        response
    }
}

impl IntoResponse for SubmissionOutcome {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(SubmissionResponse::from(self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let accepted = SubmissionResponse::from(SubmissionOutcome::Accepted {
            message: "ok",
            notice: Some(Notice::RequiresConfirmation),
        });
        assert_eq!(
            serde_json::to_value(accepted).unwrap(),
            json!({ "success": true, "message": "ok", "requiresConfirmation": true })
        );

        let mut errors = FieldErrors::default();
        errors.add("email", "Please enter a valid email address");
        let invalid = SubmissionResponse::from(SubmissionOutcome::Invalid {
            error: "Please check your form and try again.",
            field_errors: errors,
        });
        assert_eq!(
            serde_json::to_value(invalid).unwrap(),
            json!({
                "success": false,
                "error": "Please check your form and try again.",
                "fieldErrors": { "email": ["Please enter a valid email address"] }
            })
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SubmissionOutcome::accepted("ok").status(), StatusCode::OK);
        assert_eq!(
            SubmissionOutcome::Rejected("no").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SubmissionOutcome::Failed("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
