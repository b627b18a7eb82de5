//! Persisted intention data model.
//!
//! Field names and epoch-millisecond timestamps match the persisted layout
//! shared with other hosts reading the same key-value store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the sentinel text stored for a timed access pass.
pub const TIMED_PASS_PREFIX: &str = "block:";

/// Value stored under a per-domain intention key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIntention {
    pub intention: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// A previously accepted intention for one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentionRecord {
    /// Normalized domain key.
    pub domain: String,
    /// Intention text, or a `block:N` sentinel for a timed pass.
    pub intention_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IntentionRecord {
    /// Build a record from its stored form.
    pub fn from_stored(domain: impl Into<String>, stored: StoredIntention) -> Self {
        Self {
            domain: domain.into(),
            intention_text: stored.intention,
            created_at: stored.timestamp,
            expires_at: stored.expires_at,
        }
    }

    /// Convert into the stored form.
    pub fn to_stored(&self) -> StoredIntention {
        StoredIntention {
            intention: self.intention_text.clone(),
            timestamp: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Minutes of a timed pass, if this record holds the `block:N` sentinel.
    pub fn timed_pass_minutes(&self) -> Option<u32> {
        parse_timed_pass(&self.intention_text)
    }
}

/// Parse a `block:N` sentinel.
pub fn parse_timed_pass(text: &str) -> Option<u32> {
    text.strip_prefix(TIMED_PASS_PREFIX)?.parse().ok()
}

/// Format a `block:N` sentinel.
pub fn timed_pass_sentinel(minutes: u32) -> String {
    format!("{}{}", TIMED_PASS_PREFIX, minutes)
}

/// The single currently declared intention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIntention {
    pub domain: String,
    #[serde(rename = "intention")]
    pub intention_text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl ActiveIntention {
    /// Whether the intention is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Short-lived marker written right after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JustSetMarker {
    pub domain: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}
