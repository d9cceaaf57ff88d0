//! In-memory session store implementation.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use super::expiry::ExpirationPolicy;
use super::traits::{Message, Role, Session, SessionError, SessionStore, SweepReport};

/// Mutable state of one session, guarded by its own mutex.
struct SessionEntry {
    id: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    /// Set once the entry has been unlinked from the map. Appends that raced
    /// with the removal observe this and report `NotFound`.
    removed: bool,
}

impl SessionEntry {
    fn snapshot(&self) -> Session {
        Session {
            id: self.id.clone(),
            messages: self.messages.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

type SharedEntry = Arc<Mutex<SessionEntry>>;

/// An in-memory session store with one guard per session.
///
/// The outer `RwLock` only protects membership of the map; message appends
/// take the outer lock shared and then the per-session mutex, so traffic on
/// different sessions never serializes on a single lock.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SharedEntry>>,
    policy: ExpirationPolicy,
}

impl InMemorySessionStore {
    pub fn new(policy: ExpirationPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Append under the session guard and run `read` over the history the
    /// append produced before the guard is released.
    fn push_message<T>(
        &self,
        id: &str,
        role: Role,
        content: &str,
        read: impl FnOnce(&[Message]) -> T,
    ) -> Result<(Message, T), SessionError> {
        if content.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let entry = self
            .entry(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let mut guard = entry.lock();

        let now = Utc::now();
        if guard.removed || self.policy.is_expired_at(guard.last_activity, now) {
            return Err(SessionError::NotFound(id.to_string()));
        }

        // Never let a wall-clock step backwards reorder activity.
        let stamp = now.max(guard.last_activity);
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            created_at: stamp,
        };
        guard.messages.push(message.clone());
        guard.last_activity = stamp;

        let extra = read(&guard.messages);
        Ok((message, extra))
    }

    fn entry(&self, id: &str) -> Option<SharedEntry> {
        self.sessions.read().get(id).cloned()
    }

    /// Unlink `id` only if it still maps to `expected`.
    fn unlink_if_same(&self, id: &str, expected: &SharedEntry) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(id) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Shift a session's timestamps into the past.
    #[cfg(test)]
    pub(crate) fn backdate(&self, id: &str, by: chrono::Duration) {
        if let Some(entry) = self.entry(id) {
            let mut entry = entry.lock();
            entry.created_at -= by;
            entry.last_activity -= by;
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(ExpirationPolicy::default())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> Session {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let mut id = uuid::Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }

        let entry = SessionEntry {
            id: id.clone(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            removed: false,
        };
        let session = entry.snapshot();
        sessions.insert(id, Arc::new(Mutex::new(entry)));
        drop(sessions);

        tracing::debug!(session_id = %session.id, "session created");
        session
    }

    fn get(&self, id: &str) -> Result<Session, SessionError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let guard = entry.lock();
        if guard.removed {
            return Err(SessionError::NotFound(id.to_string()));
        }
        if !self.policy.is_expired_at(guard.last_activity, Utc::now()) {
            return Ok(guard.snapshot());
        }
        drop(guard);

        // Lazily evict; the caller sees NotFound either way.
        if self.unlink_if_same(id, &entry) {
            entry.lock().removed = true;
            tracing::debug!(session_id = %id, "expired session evicted on access");
        }
        Err(SessionError::NotFound(id.to_string()))
    }

    fn append(&self, id: &str, role: Role, content: &str) -> Result<Message, SessionError> {
        self.push_message(id, role, content, |_| ())
            .map(|(message, ())| message)
    }

    fn append_with_history(
        &self,
        id: &str,
        role: Role,
        content: &str,
    ) -> Result<(Message, Vec<Message>), SessionError> {
        self.push_message(id, role, content, <[Message]>::to_vec)
    }

    fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(entry) => {
                entry.lock().removed = true;
                tracing::debug!(session_id = %id, "session deleted");
                true
            }
            None => false,
        }
    }

    fn delete_all(&self) -> usize {
        let drained: Vec<SharedEntry> = {
            let mut sessions = self.sessions.write();
            sessions.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.lock().removed = true;
        }
        drained.len()
    }

    fn list(&self) -> Vec<Session> {
        let sessions = self.sessions.read();
        // Hold every entry guard at once so the snapshot reflects a single
        // instant. Appends only ever hold one entry guard and never wait on
        // the map lock while holding it, so this cannot deadlock.
        let guards: Vec<MutexGuard<'_, SessionEntry>> =
            sessions.values().map(|entry| entry.lock()).collect();
        let mut results: Vec<Session> = guards.iter().map(|g| g.snapshot()).collect();
        drop(guards);
        drop(sessions);

        results.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        results
    }

    fn cleanup(&self) -> SweepReport {
        let now = Utc::now();
        let candidates: Vec<(String, SharedEntry)> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, entry)| self.policy.is_expired_at(entry.lock().last_activity, now))
                .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
                .collect()
        };

        // Expired sessions reject appends, so a candidate can only change
        // state by being removed elsewhere in the meantime.
        let mut report = SweepReport::default();
        for (id, entry) in candidates {
            if self.unlink_if_same(&id, &entry) {
                entry.lock().removed = true;
                report.removed += 1;
            } else {
                report.skipped += 1;
            }
        }

        if report.removed > 0 || report.skipped > 0 {
            tracing::info!(
                removed = report.removed,
                skipped = report.skipped,
                "expired sessions swept"
            );
        }
        report
    }

    fn policy(&self) -> ExpirationPolicy {
        self.policy
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
