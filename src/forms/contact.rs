//! Contact ("work with us") form submission.

use chrono::Utc;
use serde_json::{json, Value};

use super::rate_limit::RateDecision;
use super::validation::{honeypot_tripped, normalize_email, parse, ContactFormData, CONTACT_RULES};
use super::SubmissionOutcome;
use crate::content::Mutation;
use crate::email::templates;
use crate::email::EmailMessage;
use crate::error::{ContentError, SubmissionError};
use crate::state::AppState;

/// Rate-limit scope for contact submissions
pub const RATE_LIMIT_SCOPE: &str = "contact";

const INVALID_SUBMISSION: &str = "Invalid submission";
const CHECK_FORM: &str = "Please check your form and try again.";
const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";
const THANK_YOU: &str = "Thank you for reaching out! We'll be in touch within 24 hours.";
const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again or email us directly.";

/// Validate, rate-limit, email and persist a contact inquiry.
#[tracing::instrument(skip_all)]
pub async fn submit_contact_form(state: &AppState, input: &Value) -> SubmissionOutcome {
    if honeypot_tripped(input) {
        tracing::warn!("Contact form honeypot triggered");
        return SubmissionOutcome::Rejected(INVALID_SUBMISSION);
    }

    let data: ContactFormData = match parse(CONTACT_RULES, input) {
        Ok(data) => data,
        Err(field_errors) => {
            tracing::info!(fields = ?field_errors, "Contact form failed validation");
            return SubmissionOutcome::Invalid {
                error: CHECK_FORM,
                field_errors,
            };
        }
    };

    let key = normalize_email(&data.email);
    match state
        .rate_limiter
        .check(RATE_LIMIT_SCOPE, &key, &state.config.contact_rate_limit)
        .await
    {
        Ok(RateDecision::Allowed) => {}
        Ok(RateDecision::Limited { retry_after }) => {
            tracing::warn!(email = %key, retry_after_secs = retry_after.as_secs(), "Contact form rate limit hit");
            return SubmissionOutcome::Rejected(TOO_MANY_REQUESTS);
        }
        Err(e) => {
            tracing::error!(error = %e, "Rate limiter unavailable; accepting submission");
        }
    }

    match deliver(state, &data).await {
        Ok(()) => {
            tracing::info!(organization = %data.organization, "Contact submission accepted");
            SubmissionOutcome::accepted(THANK_YOU)
        }
        Err(e) => {
            tracing::error!(error = %e, "Contact submission failed");
            SubmissionOutcome::Failed(SOMETHING_WENT_WRONG)
        }
    }
}

async fn deliver(state: &AppState, data: &ContactFormData) -> Result<(), SubmissionError> {
    let config = &state.config;

    let confirmation = templates::contact_confirmation(data, &config.site_url);
    let confirmation = EmailMessage {
        from: config.email.from.clone(),
        to: data.email.clone(),
        subject: confirmation.subject,
        html: confirmation.html,
    };

    let notification = templates::internal_notification(data);
    let notification = EmailMessage {
        from: config.email.notifications_from.clone(),
        to: config.email.internal_recipient.clone(),
        subject: notification.subject,
        html: notification.html,
    };

    tokio::try_join!(
        state.mailer.send(&confirmation),
        state.mailer.send(&notification)
    )?;

    state
        .content
        .mutate(vec![Mutation::Create(submission_document(data)?)])
        .await?;

    Ok(())
}

/// Stored record of an inquiry, awaiting triage.
fn submission_document(data: &ContactFormData) -> Result<Value, ContentError> {
    let mut doc = serde_json::to_value(data)?;
    if let Value::Object(fields) = &mut doc {
        fields.insert("_type".into(), json!("contactSubmission"));
        fields.insert("submittedAt".into(), json!(Utc::now().to_rfc3339()));
        fields.insert("status".into(), json!("new"));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::testing::RecordingMailer;
    use crate::forms::validation::fixtures::contact_payload;
    use crate::state::testing::Harness;

    async fn submissions(harness: &Harness) -> Vec<Value> {
        harness.content.documents_of_type("contactSubmission").await
    }

    #[tokio::test]
    async fn test_valid_submission_sends_two_emails_and_persists() {
        let harness = Harness::new(vec![]);
        let outcome = submit_contact_form(&harness.state, &contact_payload()).await;
        assert_eq!(outcome, SubmissionOutcome::accepted(THANK_YOU));

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 2);
        let client = sent.iter().find(|m| m.to == "avery@example.org").unwrap();
        assert_eq!(client.subject, "We received your inquiry - Equity by Design");
        assert_eq!(client.from, "Equity by Design <hello@equitybydesign.com>");
        let internal = sent.iter().find(|m| m.to == "team@equitybydesign.com").unwrap();
        assert_eq!(internal.subject, "New Project Inquiry: Riverside Literacy Project");

        let stored = submissions(&harness).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["status"], "new");
        assert_eq!(stored[0]["organizationType"], "nonprofit-education");
        assert!(stored[0]["submittedAt"].is_string());
    }

    #[tokio::test]
    async fn test_honeypot_rejects_silently() {
        let harness = Harness::new(vec![]);
        let mut payload = contact_payload();
        payload["_honeypot"] = json!("http://spam.example");

        let outcome = submit_contact_form(&harness.state, &payload).await;
        assert_eq!(outcome, SubmissionOutcome::Rejected(INVALID_SUBMISSION));
        assert!(harness.mailer.sent().is_empty());
        assert!(submissions(&harness).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_reports_fields_without_side_effects() {
        let harness = Harness::new(vec![]);
        let mut payload = contact_payload();
        payload["email"] = json!("not-an-email");
        payload["projectDescription"] = json!("too short");

        match submit_contact_form(&harness.state, &payload).await {
            SubmissionOutcome::Invalid {
                error,
                field_errors,
            } => {
                assert_eq!(error, CHECK_FORM);
                assert!(field_errors.contains("email"));
                assert!(field_errors.contains("projectDescription"));
            }
            other => panic!("expected invalid, got {other:?}"),
        }
        assert!(harness.mailer.sent().is_empty());
        assert!(submissions(&harness).await.is_empty());
    }

    #[tokio::test]
    async fn test_fourth_submission_within_window_is_limited() {
        let harness = Harness::new(vec![]);
        for _ in 0..3 {
            assert!(submit_contact_form(&harness.state, &contact_payload())
                .await
                .is_success());
        }

        // Same address with different casing still counts.
        let mut payload = contact_payload();
        payload["email"] = json!("AVERY@example.org");
        let outcome = submit_contact_form(&harness.state, &payload).await;
        assert_eq!(outcome, SubmissionOutcome::Rejected(TOO_MANY_REQUESTS));
        assert_eq!(harness.mailer.sent().len(), 6);
        assert_eq!(submissions(&harness).await.len(), 3);
    }

    #[tokio::test]
    async fn test_email_failure_is_reported_without_detail() {
        let harness = Harness::with_mailer(vec![], RecordingMailer::failing());
        let outcome = submit_contact_form(&harness.state, &contact_payload()).await;
        assert_eq!(outcome, SubmissionOutcome::Failed(SOMETHING_WENT_WRONG));
        assert!(submissions(&harness).await.is_empty());
    }
}
