//! Declarative field rules for the public forms.
//!
//! Payloads arrive as raw JSON. Each form has a table of [`FieldRule`]s that is
//! checked in full (every failing field is reported, not just the first), and
//! only a payload that passes every rule is deserialized into its typed form.

use std::collections::BTreeMap;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

lazy_static::lazy_static! {
    /// Something@something.tld with no whitespace.
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub const HONEYPOT_FIELD: &str = "_honeypot";

// ============================================================================
// Field errors
// ============================================================================

/// Messages keyed by field name, in the shape a form UI can bind to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// String with a character count in `min..=max`.
    Text { min: usize, max: Option<usize> },
    Email,
    OneOf(&'static [&'static str]),
    /// Array of strings with at least `min` entries.
    List { min: usize },
    Bool,
    /// Boolean that must be `true`; `false` and absence both fail.
    MustBeTrue,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub check: Check,
    /// Replaces the generic message for every failure of this field.
    pub message: Option<&'static str>,
}

impl FieldRule {
    pub const fn required(field: &'static str, check: Check) -> Self {
        Self {
            field,
            required: true,
            check,
            message: None,
        }
    }

    pub const fn optional(field: &'static str, check: Check) -> Self {
        Self {
            field,
            required: false,
            check,
            message: None,
        }
    }

    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = match value {
            None | Some(Value::Null) => {
                return match self.check {
                    Check::MustBeTrue => Some("Must be accepted".to_string()),
                    _ if self.required => Some("Required".to_string()),
                    _ => None,
                };
            }
            Some(value) => value,
        };

        let problem = match (self.check, value) {
            (Check::Text { min, max }, Value::String(s)) => {
                let len = s.trim().chars().count();
                if len < min {
                    Some(format!("Must be at least {min} characters"))
                } else if max.is_some_and(|max| len > max) {
                    Some(format!("Must be at most {} characters", max.unwrap_or_default()))
                } else {
                    None
                }
            }
            (Check::Email, Value::String(s)) => {
                (!EMAIL_REGEX.is_match(s.trim())).then(|| "Invalid email address".to_string())
            }
            (Check::OneOf(options), Value::String(s)) => {
                (!options.contains(&s.as_str())).then(|| "Invalid option".to_string())
            }
            (Check::List { min }, Value::Array(items)) => {
                if !items.iter().all(Value::is_string) {
                    Some("Expected a list of text values".to_string())
                } else if items.len() < min {
                    Some(format!("Select at least {min}"))
                } else {
                    None
                }
            }
            (Check::Bool, Value::Bool(_)) => None,
            (Check::MustBeTrue, Value::Bool(true)) => None,
            (Check::MustBeTrue, Value::Bool(false)) => Some("Must be accepted".to_string()),
            (Check::List { .. }, _) => Some("Expected a list".to_string()),
            (Check::Bool | Check::MustBeTrue, _) => Some("Expected true or false".to_string()),
            _ => Some("Expected text".to_string()),
        };
        problem.map(|generic| self.message.map(str::to_string).unwrap_or(generic))
    }
}

/// Check every rule against `input`, collecting all failures.
pub fn validate(rules: &[FieldRule], input: &Value) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if !input.is_object() {
        errors.add("_form", "Expected a JSON object");
        return Err(errors);
    }
    for rule in rules {
        if let Some(message) = rule.check(input.get(rule.field)) {
            errors.add(rule.field, message);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate, then deserialize into the typed form.
pub fn parse<T: DeserializeOwned>(rules: &[FieldRule], input: &Value) -> Result<T, FieldErrors> {
    validate(rules, input)?;
    serde_json::from_value(input.clone()).map_err(|e| {
        let mut errors = FieldErrors::default();
        errors.add("_form", e.to_string());
        errors
    })
}

/// Whether the hidden field was filled in. Any non-empty value counts.
pub fn honeypot_tripped(input: &Value) -> bool {
    match input.get(HONEYPOT_FIELD) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

// ============================================================================
// Contact form
// ============================================================================

pub const ORGANIZATION_TYPES: &[&str] = &[
    "nonprofit-education",
    "nonprofit-health",
    "nonprofit-justice",
    "nonprofit-environment",
    "nonprofit-arts",
    "nonprofit-other",
    "corporate-tech",
    "corporate-finance",
    "corporate-healthcare",
    "corporate-other",
    "government",
    "foundation",
    "individual",
    "other",
];

pub const ORGANIZATION_SIZES: &[&str] = &["small", "medium", "large", "enterprise"];

pub const TIMELINES: &[&str] = &["urgent", "soon", "flexible", "planning"];

pub const BUDGETS: &[&str] = &[
    "under-10k",
    "10k-25k",
    "25k-50k",
    "50k-100k",
    "over-100k",
    "not-sure",
];

pub const CONTACT_RULES: &[FieldRule] = &[
    FieldRule::required("name", Check::Text { min: 2, max: Some(100) })
        .with_message("Name must be between 2 and 100 characters"),
    FieldRule::required("email", Check::Email),
    FieldRule::optional("phone", Check::Text { min: 0, max: Some(50) }),
    FieldRule::required("organization", Check::Text { min: 2, max: Some(200) }),
    FieldRule::required("organizationType", Check::OneOf(ORGANIZATION_TYPES)),
    FieldRule::optional("organizationSize", Check::OneOf(ORGANIZATION_SIZES)),
    FieldRule::required("projectType", Check::List { min: 1 })
        .with_message("Select at least one service"),
    FieldRule::required("projectDescription", Check::Text { min: 50, max: Some(2000) })
        .with_message("Please provide between 50 and 2000 characters about your project"),
    FieldRule::optional("goals", Check::Text { min: 0, max: Some(1000) }),
    FieldRule::required("timeline", Check::OneOf(TIMELINES)),
    FieldRule::optional("budget", Check::OneOf(BUDGETS)),
    FieldRule::optional("referralSource", Check::Text { min: 0, max: Some(200) }),
    FieldRule::optional("additionalInfo", Check::Text { min: 0, max: Some(1000) }),
    FieldRule::optional("marketingConsent", Check::Bool),
];

/// How soon the inquirer wants to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    Urgent,
    Soon,
    Flexible,
    Planning,
}

impl Timeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Soon => "soon",
            Self::Flexible => "flexible",
            Self::Planning => "planning",
        }
    }
}

/// A contact inquiry that passed [`CONTACT_RULES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFormData {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub organization: String,
    pub organization_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_size: Option<String>,
    pub project_type: Vec<String>,
    pub project_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub marketing_consent: bool,
}

// ============================================================================
// Newsletter forms
// ============================================================================

pub const FREQUENCIES: &[&str] = &["weekly", "biweekly", "monthly"];

pub const SUBSCRIBE_RULES: &[FieldRule] = &[
    FieldRule::required("email", Check::Email).with_message("Please enter a valid email address"),
    FieldRule::optional("firstName", Check::Text { min: 1, max: Some(50) }),
    FieldRule::optional("lastName", Check::Text { min: 0, max: Some(50) }),
    FieldRule::optional("interests", Check::List { min: 0 }),
    FieldRule::optional("source", Check::Text { min: 0, max: Some(100) }),
    FieldRule::required("gdprConsent", Check::MustBeTrue)
        .with_message("You must consent to receive emails"),
];

pub const UNSUBSCRIBE_RULES: &[FieldRule] = &[
    FieldRule::required("email", Check::Email),
    FieldRule::optional("token", Check::Text { min: 1, max: None }),
];

pub const PREFERENCES_RULES: &[FieldRule] = &[
    FieldRule::required("email", Check::Email),
    FieldRule::required("token", Check::Text { min: 1, max: None }),
    FieldRule::optional("interests", Check::List { min: 0 }),
    FieldRule::optional("frequency", Check::OneOf(FREQUENCIES)),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscription {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub gdpr_consent: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreferencesRequest {
    pub email: String,
    pub token: String,
    #[serde(default)]
    pub interests: Option<Vec<String>>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

/// Lowercased, trimmed address used as the identity of a subscriber.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
