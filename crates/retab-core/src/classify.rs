//! Maps backend failures onto the closed set of user-facing categories.
//!
//! Classification is a pure function of the error's status code and message
//! content; it never depends on retry counts or prior runner state. The core
//! never retries on its own -- retry is caller-initiated and only gated by
//! the cooldown carried here.

use std::fmt;

use crate::error::BackendError;

/// Cooldown applied to quota/429-class failures.
pub const RATE_LIMIT_COOLDOWN_SECS: u32 = 60;

/// Cooldown applied to unclassified failures, including timeouts.
pub const TRANSIENT_COOLDOWN_SECS: u32 = 3;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// No usable credential was configured before the call was attempted.
    MissingCredential,
    /// The invocation target cannot be resolved or billed.
    EntityNotConfigured,
    /// Quota exhaustion or a 429-class condition.
    RateLimited,
    /// The credential is invalid or expired.
    AuthInvalid,
    /// Anything else, including timeouts.
    TransientUnknown,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCategory::MissingCredential => "missing_credential",
            FailureCategory::EntityNotConfigured => "entity_not_configured",
            FailureCategory::RateLimited => "rate_limited",
            FailureCategory::AuthInvalid => "auth_invalid",
            FailureCategory::TransientUnknown => "transient_unknown",
        };
        f.write_str(s)
    }
}

/// A classified terminal failure, ready to surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: FailureCategory,
    /// Human-readable message carried from the backend error.
    pub message: String,
    /// Seconds the caller must wait before the next run may start.
    pub cooldown_secs: u32,
}

/// Classify a backend error into a category and its cooldown.
pub fn classify(err: &BackendError) -> Failure {
    let category = match err {
        BackendError::MissingCredential(_) => FailureCategory::MissingCredential,
        BackendError::Api { status, message } => classify_api(*status, message),
        BackendError::Transport { .. } | BackendError::Protocol(_) => {
            FailureCategory::TransientUnknown
        }
    };
    Failure {
        category,
        message: err.to_string(),
        cooldown_secs: cooldown_for(category),
    }
}

/// Cooldown for a category. Consistent across all runs.
pub fn cooldown_for(category: FailureCategory) -> u32 {
    match category {
        FailureCategory::RateLimited => RATE_LIMIT_COOLDOWN_SECS,
        FailureCategory::TransientUnknown => TRANSIENT_COOLDOWN_SECS,
        FailureCategory::MissingCredential
        | FailureCategory::EntityNotConfigured
        | FailureCategory::AuthInvalid => 0,
    }
}

/// Classify a non-success HTTP response. Status codes win over message
/// content; message matching covers backends that report structured
/// conditions through 400-class bodies.
fn classify_api(status: u16, message: &str) -> FailureCategory {
    let lower = message.to_lowercase();
    match status {
        429 => FailureCategory::RateLimited,
        401 | 403 => FailureCategory::AuthInvalid,
        404 => FailureCategory::EntityNotConfigured,
        _ if lower.contains("quota") || lower.contains("resource_exhausted") => {
            FailureCategory::RateLimited
        }
        _ if lower.contains("api key") => FailureCategory::AuthInvalid,
        _ if lower.contains("requested entity was not found") || lower.contains("billing") => {
            FailureCategory::EntityNotConfigured
        }
        _ => FailureCategory::TransientUnknown,
    }
}
