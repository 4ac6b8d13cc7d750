//! Onboarding: credential validation and organization selection
//!
//! Unlike the refresh loop, these calls are user-initiated, so failures come
//! back as a displayable [`ValidationStatus`] rather than only a log line.

use crate::api::UsageSource;
use crate::error::{Error, Result};
use crate::store::Preferences;
use crate::types::{Credentials, Organization};

/// Prefix every web session key carries
pub const SESSION_KEY_PREFIX: &str = "sk-ant-";

/// Outcome shown to the user after a validation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Success(String),
    Error(String),
}

impl ValidationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationStatus::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationStatus::Success(msg) | ValidationStatus::Error(msg) => msg,
        }
    }
}

/// Local shape check, no network.
pub fn check_session_key_format(session_key: &str) -> std::result::Result<(), String> {
    let key = session_key.trim();
    if key.is_empty() {
        return Err("Session key is empty".to_string());
    }
    if !key.starts_with(SESSION_KEY_PREFIX) {
        return Err(format!(
            "Session key should start with \"{}\"",
            SESSION_KEY_PREFIX
        ));
    }
    if key.chars().any(char::is_whitespace) {
        return Err("Session key must not contain whitespace".to_string());
    }
    Ok(())
}

fn describe_failure(error: &Error) -> String {
    match error {
        Error::Unauthorized(_) => "Session key was rejected. Copy a fresh one and try again.".to_string(),
        Error::Api { status, .. } => format!("Server returned an error ({})", status),
        Error::Http(e) if e.is_timeout() => "Request timed out".to_string(),
        Error::Http(_) => "Could not reach the server".to_string(),
        Error::Json(_) => "Server response was not understood".to_string(),
        other => other.to_string(),
    }
}

/// Check a session key against the organizations endpoint.
///
/// Returns the status to display and the organizations found (empty on error).
pub async fn validate_session_key(
    source: &dyn UsageSource,
    session_key: &str,
) -> (ValidationStatus, Vec<Organization>) {
    if let Err(msg) = check_session_key_format(session_key) {
        return (ValidationStatus::Error(msg), Vec::new());
    }

    match source.fetch_organizations(session_key.trim()).await {
        Ok(orgs) if orgs.is_empty() => (
            ValidationStatus::Error("No organizations found for this session key".to_string()),
            orgs,
        ),
        Ok(orgs) => {
            let msg = if orgs.len() == 1 {
                format!("Connected to {}", display_name(&orgs[0]))
            } else {
                format!("Found {} organizations", orgs.len())
            };
            (ValidationStatus::Success(msg), orgs)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session key validation failed");
            (ValidationStatus::Error(describe_failure(&e)), Vec::new())
        }
    }
}

/// Check console credentials by fetching API usage once.
pub async fn validate_api_credentials(
    source: &dyn UsageSource,
    creds: &Credentials,
) -> ValidationStatus {
    if let Err(msg) = check_session_key_format(&creds.session_key) {
        return ValidationStatus::Error(msg);
    }
    if creds.organization_id.trim().is_empty() {
        return ValidationStatus::Error("Organization ID is empty".to_string());
    }

    match source.fetch_api_usage(creds).await {
        Ok(usage) => ValidationStatus::Success(format!(
            "API credits: ${:.2} used, ${:.2} remaining",
            usage.used_amount, usage.remaining_amount
        )),
        Err(e) => {
            tracing::warn!(error = %e, "API credential validation failed");
            ValidationStatus::Error(describe_failure(&e))
        }
    }
}

/// Validate console credentials and turn on API credit tracking.
///
/// Nothing is written unless validation succeeds.
pub async fn enable_api_tracking(
    prefs: &Preferences,
    source: &dyn UsageSource,
    creds: &Credentials,
) -> Result<ValidationStatus> {
    let status = validate_api_credentials(source, creds).await;
    if !status.is_success() {
        return Ok(status);
    }

    prefs.set_api_session_key(creds.session_key.trim())?;
    prefs.set_api_organization_id(creds.organization_id.trim())?;
    prefs.set_api_tracking_enabled(true)?;

    tracing::info!(organization = %creds.organization_id, "API credit tracking enabled");
    Ok(status)
}

fn display_name(org: &Organization) -> &str {
    if org.name.is_empty() {
        &org.uuid
    } else {
        &org.name
    }
}

/// Validate, pick an organization, and persist the result.
///
/// `organization_id` selects among the key's organizations; when None the
/// first one is used. Nothing is written unless validation succeeds.
pub async fn complete_setup(
    prefs: &Preferences,
    source: &dyn UsageSource,
    session_key: &str,
    organization_id: Option<&str>,
) -> Result<ValidationStatus> {
    let (status, orgs) = validate_session_key(source, session_key).await;
    if !status.is_success() {
        return Ok(status);
    }

    let chosen = match organization_id {
        Some(id) => match orgs.iter().find(|o| o.uuid == id) {
            Some(org) => org,
            None => {
                return Ok(ValidationStatus::Error(format!(
                    "Organization {} is not available for this session key",
                    id
                )))
            }
        },
        None => match orgs.first() {
            Some(org) => org,
            None => {
                return Ok(ValidationStatus::Error(
                    "No organizations found for this session key".to_string(),
                ))
            }
        },
    };

    prefs.set_session_key(session_key)?;
    prefs.set_organization_id(&chosen.uuid)?;
    prefs.set_has_completed_setup(true)?;

    tracing::info!(organization = %chosen.uuid, "Setup completed");
    Ok(ValidationStatus::Success(format!(
        "Connected to {}",
        display_name(chosen)
    )))
}
