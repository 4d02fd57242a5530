//! Newtype wrappers for Slack identifiers.
//!
//! These keep the upstream event id (the deduplication key) from being mixed up
//! with the other free-form strings that travel in an envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Slack Events API event id (e.g. `Ev08MFMKH6`).
///
/// Opaque and supplied by Slack; uniqueness is assumed, not derived. Retries of
/// the same logical event carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(s: impl Into<String>) -> Self {
        EventId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}
