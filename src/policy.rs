use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;

/// Upload policy attached to a presigned POST form.
///
/// The document is built fresh for every [`build_post_form_args`] call and
/// handed to the strategy through the request's [`PostFormContext`]; the
/// strategy serializes and signs it, then publishes it as form fields.
///
/// [`build_post_form_args`]: crate::RequestSigner::build_post_form_args
/// [`PostFormContext`]: crate::PostFormContext
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDocument {
    /// Absolute expiration timestamp, `YYYY-MM-DDTHH:MM:SSZ` in UTC.
    pub expiration: String,
    /// Caller-supplied conditions, in the order supplied.
    ///
    /// Order is preserved verbatim since it affects the signature the
    /// strategy computes over the serialized document.
    pub conditions: Vec<serde_json::Value>,
}

impl PolicyDocument {
    /// Build a policy expiring `expires_in` from now.
    pub fn expiring_in(expires_in: Duration, conditions: Vec<serde_json::Value>) -> Self {
        Self::expiring_at(Utc::now() + expires_in, conditions)
    }

    /// Build a policy expiring at the given instant.
    pub fn expiring_at(at: DateTime<Utc>, conditions: Vec<serde_json::Value>) -> Self {
        Self {
            expiration: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            conditions,
        }
    }
}
