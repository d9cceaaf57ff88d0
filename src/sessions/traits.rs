//! Session storage traits and types for chat conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::expiry::ExpirationPolicy;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat turn. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A tracked conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Failures surfaced by session operations. Both are client-correctable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Outcome of an expiration sweep.
///
/// `skipped` counts expired entries that could not be removed by this sweep
/// (already removed by a concurrent delete). They never abort the sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub skipped: usize,
}

/// Keyed storage for chat sessions.
///
/// Every operation completes in memory and never waits on external I/O.
/// Operations on a single session are linearizable; operations on distinct
/// sessions never contend on the same guard.
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh, empty session.
    fn create(&self) -> Session;

    /// Snapshot a session. Expired entries are reported as `NotFound`.
    fn get(&self, id: &str) -> Result<Session, SessionError>;

    /// Append a message and bump `last_activity`. The only mutation entry point.
    fn append(&self, id: &str, role: Role, content: &str) -> Result<Message, SessionError>;

    /// Append like [`SessionStore::append`] and return the history up to and
    /// including the new message, read under the same guard as the write.
    fn append_with_history(
        &self,
        id: &str,
        role: Role,
        content: &str,
    ) -> Result<(Message, Vec<Message>), SessionError>;

    /// Remove a session. Returns whether it existed.
    fn delete(&self, id: &str) -> bool;

    /// Remove every session. Returns how many were removed.
    fn delete_all(&self) -> usize;

    /// Point-in-time snapshot of every stored session (expired-but-unswept included),
    /// most recently active first.
    fn list(&self) -> Vec<Session>;

    /// Remove every expired session.
    fn cleanup(&self) -> SweepReport;

    /// The expiration rule this store applies on `get`, `append` and `cleanup`.
    fn policy(&self) -> ExpirationPolicy;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
