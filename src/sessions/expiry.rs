//! Staleness rules for sessions.

use chrono::{DateTime, Duration, Utc};

use super::traits::Session;

/// Default inactivity window before a session expires (24 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Inactivity-based expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl: Duration,
}

impl ExpirationPolicy {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(std::time::Duration::from_secs(secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A session is expired once `now - last_activity` strictly exceeds the TTL.
    pub fn is_expired_at(&self, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_activity) > self.ttl
    }

    pub fn is_session_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.is_expired_at(session.last_activity, now)
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_SESSION_TTL_SECS)
    }
}
