//! Newsletter lifecycle: double opt-in subscribe, confirm, unsubscribe and
//! preference updates.
//!
//! One subscriber document per normalized email, under a deterministic id, so
//! concurrent subscribes for the same address converge on one record.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::tokens::TokenPurpose;
use super::validation::{
    honeypot_tripped, normalize_email, parse, NewsletterSubscription, PreferencesRequest,
    UnsubscribeRequest, PREFERENCES_RULES, SUBSCRIBE_RULES, UNSUBSCRIBE_RULES,
};
use super::{Notice, SubmissionOutcome};
use crate::content::query::{ContentQuery, Filter, Selection};
use crate::content::{decode_optional, Mutation};
use crate::email::templates::{self, RenderedEmail};
use crate::email::EmailMessage;
use crate::error::{ContentError, DeliveryError, SubmissionError};
use crate::marketing::SubscriberStatus;
use crate::state::AppState;

pub const SUBSCRIBER_TYPE: &str = "newsletterSubscriber";

const INVALID_SUBMISSION: &str = "Invalid submission";
const CHECK_INFORMATION: &str = "Please check your information and try again.";
const ALREADY_SUBSCRIBED: &str = "You're already subscribed! Check your inbox for our latest updates.";
const CONFIRMATION_SENT: &str = "Almost there! Please check your email to confirm your subscription.";
const SUBSCRIBE_FAILED: &str = "Something went wrong. Please try again.";

const INVALID_CONFIRMATION: &str = "Invalid or expired confirmation link.";
const CONFIRMED: &str = "Welcome! Your subscription is confirmed.";
const CONFIRM_FAILED: &str = "Failed to confirm subscription. Please try again.";

const INVALID_UNSUBSCRIBE: &str = "Invalid unsubscribe link.";
const UNSUBSCRIBED: &str = "You've been unsubscribed. We're sorry to see you go!";
const UNSUBSCRIBE_FAILED: &str = "Failed to unsubscribe. Please try again.";

const INVALID_PREFERENCES: &str = "Invalid preferences link.";
const PREFERENCES_UPDATED: &str = "Your preferences have been updated.";
const PREFERENCES_FAILED: &str = "Failed to update preferences.";

/// Stored subscriber fields the lifecycle needs to read back.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubscriberRecord {
    status: String,
    confirmation_token: Option<String>,
}

impl SubscriberRecord {
    fn is(&self, status: SubscriberStatus) -> bool {
        self.status == status.as_str()
    }
}

/// Document id for the subscriber with this email.
pub fn subscriber_id(email: &str) -> String {
    let digest = Sha256::digest(normalize_email(email).as_bytes());
    format!("{SUBSCRIBER_TYPE}.{digest:x}")
}

async fn find_subscriber(
    state: &AppState,
    email: &str,
) -> Result<Option<SubscriberRecord>, ContentError> {
    let filter = Filter::of_type(SUBSCRIBER_TYPE).eq("_id", "id", subscriber_id(email));
    let query = ContentQuery::select(Selection::new(filter).first());
    decode_optional(state.content.fetch(&query).await?)
}

fn link(site_url: &str, path: &str, params: &[(&str, &str)]) -> Result<String, SubmissionError> {
    let base = format!("{}{}", site_url.trim_end_matches('/'), path);
    reqwest::Url::parse_with_params(&base, params)
        .map(|url| url.to_string())
        .map_err(|e| SubmissionError::Link(e.to_string()))
}

fn message(state: &AppState, to: &str, email: RenderedEmail) -> EmailMessage {
    EmailMessage {
        from: state.config.email.from.clone(),
        to: to.to_string(),
        subject: email.subject,
        html: email.html,
    }
}

/// Platform sync never fails a request; the content store is authoritative.
fn log_sync_failure(result: Result<(), DeliveryError>, email: &str) {
    if let Err(e) = result {
        tracing::error!(error = %e, %email, "Marketing platform sync failed");
    }
}

// ============================================================================
// Subscribe
// ============================================================================

/// Record a pending subscription and send the confirmation link.
#[tracing::instrument(skip_all)]
pub async fn subscribe(state: &AppState, input: &Value) -> SubmissionOutcome {
    if honeypot_tripped(input) {
        tracing::warn!("Newsletter honeypot triggered");
        return SubmissionOutcome::Rejected(INVALID_SUBMISSION);
    }

    let mut subscription: NewsletterSubscription = match parse(SUBSCRIBE_RULES, input) {
        Ok(subscription) => subscription,
        Err(field_errors) => {
            return SubmissionOutcome::Invalid {
                error: CHECK_INFORMATION,
                field_errors,
            }
        }
    };
    subscription.email = normalize_email(&subscription.email);

    match start_subscription(state, &subscription).await {
        Ok(notice) => {
            let message = match notice {
                Notice::AlreadySubscribed => ALREADY_SUBSCRIBED,
                Notice::RequiresConfirmation => CONFIRMATION_SENT,
            };
            SubmissionOutcome::Accepted {
                message,
                notice: Some(notice),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Newsletter subscription failed");
            SubmissionOutcome::Failed(SUBSCRIBE_FAILED)
        }
    }
}

async fn start_subscription(
    state: &AppState,
    subscription: &NewsletterSubscription,
) -> Result<Notice, SubmissionError> {
    let email = &subscription.email;

    if let Some(existing) = find_subscriber(state, email).await? {
        if existing.is(SubscriberStatus::Active) {
            tracing::info!(%email, "Already subscribed");
            return Ok(Notice::AlreadySubscribed);
        }
    }

    let token = state.tokens.issue(email, TokenPurpose::Confirm)?;
    let confirm_url = link(&state.config.site_url, "/newsletter/confirm", &[("token", token.as_str())])?;

    let mut doc = serde_json::to_value(subscription).map_err(ContentError::from)?;
    if let Value::Object(fields) = &mut doc {
        fields.retain(|_, v| !v.is_null());
        fields.insert("_id".into(), json!(subscriber_id(email)));
        fields.insert("_type".into(), json!(SUBSCRIBER_TYPE));
        fields.insert("status".into(), json!(SubscriberStatus::Pending.as_str()));
        fields.insert("subscribedAt".into(), json!(Utc::now().to_rfc3339()));
        fields.insert("confirmationToken".into(), json!(token));
    }
    // Replacing a pending record invalidates the token it held.
    state
        .content
        .mutate(vec![Mutation::CreateOrReplace(doc)])
        .await?;

    log_sync_failure(state.marketing.subscribe(subscription).await, email);

    let rendered = templates::newsletter_confirmation(&confirm_url, &state.config.site_url);
    state.mailer.send(&message(state, email, rendered)).await?;

    tracing::info!(%email, "Newsletter confirmation sent");
    Ok(Notice::RequiresConfirmation)
}

// ============================================================================
// Confirm
// ============================================================================

/// Activate the subscription a confirmation token was issued for.
#[tracing::instrument(skip_all)]
pub async fn confirm(state: &AppState, token: &str) -> SubmissionOutcome {
    let email = match state.tokens.verify(token, TokenPurpose::Confirm) {
        Ok(email) => email,
        Err(e) => {
            tracing::info!(error = %e, "Rejected confirmation token");
            return SubmissionOutcome::Rejected(INVALID_CONFIRMATION);
        }
    };

    match activate(state, &email, token).await {
        Ok(true) => SubmissionOutcome::accepted(CONFIRMED),
        Ok(false) => SubmissionOutcome::Rejected(INVALID_CONFIRMATION),
        Err(e) => {
            tracing::error!(error = %e, "Newsletter confirmation failed");
            SubmissionOutcome::Failed(CONFIRM_FAILED)
        }
    }
}

/// `false` when the token is not the one currently on record.
async fn activate(state: &AppState, email: &str, token: &str) -> Result<bool, SubmissionError> {
    let Some(subscriber) = find_subscriber(state, email).await? else {
        tracing::info!(%email, "Confirmation for unknown subscriber");
        return Ok(false);
    };
    if subscriber.confirmation_token.as_deref() != Some(token) {
        tracing::info!(%email, "Confirmation token already used or superseded");
        return Ok(false);
    }

    state
        .content
        .mutate(vec![Mutation::patch(subscriber_id(email))
            .set("status", SubscriberStatus::Active.as_str())
            .set("confirmedAt", Utc::now().to_rfc3339())
            .unset("confirmationToken")])
        .await?;

    log_sync_failure(
        state.marketing.set_status(email, SubscriberStatus::Active).await,
        email,
    );

    let site_url = &state.config.site_url;
    let manage_token = state.tokens.issue(email, TokenPurpose::Unsubscribe)?;
    let params = [("email", email), ("token", manage_token.as_str())];
    let preferences_url = link(site_url, "/newsletter/preferences", &params)?;
    let unsubscribe_url = link(site_url, "/newsletter/unsubscribe", &params)?;
    let rendered = templates::newsletter_welcome(site_url, &preferences_url, &unsubscribe_url);
    if let Err(e) = state.mailer.send(&message(state, email, rendered)).await {
        tracing::error!(error = %e, %email, "Welcome email failed");
    }

    tracing::info!(%email, "Newsletter subscription confirmed");
    Ok(true)
}

// ============================================================================
// Unsubscribe
// ============================================================================

/// Stop sending to an address. A token, when supplied, must match the email.
#[tracing::instrument(skip_all)]
pub async fn unsubscribe(state: &AppState, input: &Value) -> SubmissionOutcome {
    let request: UnsubscribeRequest = match parse(UNSUBSCRIBE_RULES, input) {
        Ok(request) => request,
        Err(field_errors) => {
            return SubmissionOutcome::Invalid {
                error: CHECK_INFORMATION,
                field_errors,
            }
        }
    };
    let email = normalize_email(&request.email);

    if let Some(token) = &request.token {
        if let Err(e) = state.tokens.verify_for(token, &email, TokenPurpose::Unsubscribe) {
            tracing::info!(error = %e, "Rejected unsubscribe token");
            return SubmissionOutcome::Rejected(INVALID_UNSUBSCRIBE);
        }
    }

    match deactivate(state, &email).await {
        Ok(()) => SubmissionOutcome::accepted(UNSUBSCRIBED),
        Err(e) => {
            tracing::error!(error = %e, "Newsletter unsubscribe failed");
            SubmissionOutcome::Failed(UNSUBSCRIBE_FAILED)
        }
    }
}

async fn deactivate(state: &AppState, email: &str) -> Result<(), SubmissionError> {
    let Some(subscriber) = find_subscriber(state, email).await? else {
        tracing::info!(%email, "Unsubscribe for unknown address");
        return Ok(());
    };
    if subscriber.is(SubscriberStatus::Unsubscribed) {
        return Ok(());
    }

    state
        .content
        .mutate(vec![Mutation::patch(subscriber_id(email))
            .set("status", SubscriberStatus::Unsubscribed.as_str())
            .set("unsubscribedAt", Utc::now().to_rfc3339())
            .unset("confirmationToken")])
        .await?;

    log_sync_failure(
        state.marketing.set_status(email, SubscriberStatus::Unsubscribed).await,
        email,
    );

    let rendered = templates::newsletter_unsubscribed(&state.config.site_url);
    if let Err(e) = state.mailer.send(&message(state, email, rendered)).await {
        tracing::error!(error = %e, %email, "Unsubscribe notice failed");
    }

    tracing::info!(%email, "Newsletter unsubscribed");
    Ok(())
}

// ============================================================================
// Preferences
// ============================================================================

/// Change topics and frequency for a subscriber holding a valid manage token.
#[tracing::instrument(skip_all)]
pub async fn update_preferences(state: &AppState, input: &Value) -> SubmissionOutcome {
    let request: PreferencesRequest = match parse(PREFERENCES_RULES, input) {
        Ok(request) => request,
        Err(field_errors) => {
            return SubmissionOutcome::Invalid {
                error: CHECK_INFORMATION,
                field_errors,
            }
        }
    };
    let email = normalize_email(&request.email);

    if let Err(e) = state
        .tokens
        .verify_for(&request.token, &email, TokenPurpose::Unsubscribe)
    {
        tracing::info!(error = %e, "Rejected preferences token");
        return SubmissionOutcome::Rejected(INVALID_PREFERENCES);
    }

    match store_preferences(state, &email, &request).await {
        Ok(()) => SubmissionOutcome::accepted(PREFERENCES_UPDATED),
        Err(e) => {
            tracing::error!(error = %e, "Newsletter preference update failed");
            SubmissionOutcome::Failed(PREFERENCES_FAILED)
        }
    }
}

async fn store_preferences(
    state: &AppState,
    email: &str,
    request: &PreferencesRequest,
) -> Result<(), SubmissionError> {
    if find_subscriber(state, email).await?.is_none() {
        tracing::info!(%email, "Preferences for unknown address");
        return Ok(());
    }

    let mut patch = Mutation::patch(subscriber_id(email))
        .set("preferencesUpdatedAt", Utc::now().to_rfc3339());
    if let Some(interests) = &request.interests {
        patch = patch.set("interests", json!(interests));
    }
    if let Some(frequency) = request.frequency {
        patch = patch.set("frequency", json!(frequency));
    }
    state.content.mutate(vec![patch]).await?;

    log_sync_failure(
        state
            .marketing
            .update_preferences(email, request.interests.as_deref(), request.frequency)
            .await,
        email,
    );
    Ok(())
}
