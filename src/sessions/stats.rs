//! Read-only session counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::expiry::ExpirationPolicy;
use super::traits::Session;

/// Counts over one store snapshot. `active + expired == total` always holds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStats {
    #[serde(rename = "total_sessions")]
    pub total: usize,
    #[serde(rename = "active_sessions")]
    pub active: usize,
    #[serde(rename = "expired_sessions")]
    pub expired: usize,
}

impl SessionStats {
    pub fn compute(snapshot: &[Session], policy: &ExpirationPolicy, now: DateTime<Utc>) -> Self {
        let expired = snapshot
            .iter()
            .filter(|s| policy.is_session_expired(s, now))
            .count();
        Self {
            total: snapshot.len(),
            active: snapshot.len() - expired,
            expired,
        }
    }
}
