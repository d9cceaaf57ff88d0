//! Boundary operations over the session store, handed to request handlers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::context::{ContextBuilder, ContextWindow};
use super::expiry::ExpirationPolicy;
use super::in_memory::InMemorySessionStore;
use super::stats::SessionStats;
use super::traits::{Message, Role, Session, SessionError, SessionStore, SweepReport};
use crate::config::SessionsConfig;
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};

/// Result of appending a user message, possibly to a freshly created session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppendOutcome {
    pub session_id: String,
    /// `true` when the session was created by this call.
    pub created: bool,
    pub message: Message,
}

/// Process-scoped facade over a [`SessionStore`].
///
/// Owns the context bounds so callers never reach the store directly. The
/// expiration policy is always the store's own.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    context: ContextBuilder,
    observer: Arc<dyn Observer>,
    list_limit: usize,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        context: ContextBuilder,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            store,
            context,
            observer,
            list_limit: 50,
        }
    }

    /// Build an in-memory service from the `[sessions]` config section.
    pub fn from_config(config: &SessionsConfig, observer: Arc<dyn Observer>) -> Self {
        let mut service = Self::new(
            Arc::new(InMemorySessionStore::new(config.expiration_policy())),
            ContextBuilder::new(config.context_limits()),
            observer,
        );
        service.list_limit = config.list_limit;
        service
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.store.policy()
    }

    pub fn context_builder(&self) -> ContextBuilder {
        self.context
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn default_list_limit(&self) -> usize {
        self.list_limit
    }

    pub fn create_session(&self) -> Session {
        let session = self.store.create();
        self.observer
            .record_event(&ObserverEvent::SessionCreated { implicit: false });
        session
    }

    pub fn get_session(&self, id: &str) -> Result<Session, SessionError> {
        self.store.get(id)
    }

    /// Every stored session with full history, most recently active first.
    pub fn list_sessions(&self) -> Vec<Session> {
        self.store.list()
    }

    /// Non-expired sessions only, most recently active first, at most `limit`.
    pub fn list_active_sessions(&self, limit: usize) -> Vec<Session> {
        let now = Utc::now();
        let policy = self.store.policy();
        self.store
            .list()
            .into_iter()
            .filter(|s| !policy.is_session_expired(s, now))
            .take(limit)
            .collect()
    }

    /// The last `limit` messages of a session (`0` returns all of them).
    pub fn history(&self, id: &str, limit: usize) -> Result<Vec<Message>, SessionError> {
        let mut messages = self.store.get(id)?.messages;
        if limit > 0 && messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    /// Append a user message, creating the session when `id` is absent, unknown or expired.
    ///
    /// Blank content is rejected before anything is created.
    pub fn append_user_message(
        &self,
        id: Option<&str>,
        content: &str,
    ) -> Result<AppendOutcome, SessionError> {
        self.append_user_with(id, content, |sid| {
            self.store.append(sid, Role::User, content).map(|m| (m, ()))
        })
        .map(|(outcome, ())| outcome)
    }

    fn append_user_with<T>(
        &self,
        id: Option<&str>,
        content: &str,
        append: impl Fn(&str) -> Result<(Message, T), SessionError>,
    ) -> Result<(AppendOutcome, T), SessionError> {
        if content.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        if let Some(id) = id {
            match append(id) {
                Ok((message, extra)) => {
                    let outcome = AppendOutcome {
                        session_id: id.to_string(),
                        created: false,
                        message,
                    };
                    return Ok((outcome, extra));
                }
                Err(SessionError::NotFound(_)) => {
                    tracing::debug!(session_id = %id, "unknown session, starting a new one");
                }
                Err(e) => return Err(e),
            }
        }

        let session = self.store.create();
        self.observer
            .record_event(&ObserverEvent::SessionCreated { implicit: true });
        let (message, extra) = append(&session.id)?;
        let outcome = AppendOutcome {
            session_id: session.id,
            created: true,
            message,
        };
        Ok((outcome, extra))
    }

    /// Record a successful agent reply.
    pub fn append_assistant_message(&self, id: &str, content: &str) -> Result<Message, SessionError> {
        self.store.append(id, Role::Assistant, content)
    }

    /// The bounded window of history currently forwarded for `id`.
    pub fn context_window(&self, id: &str) -> Result<ContextWindow, SessionError> {
        let session = self.store.get(id)?;
        Ok(self.context.build(&session.messages))
    }

    /// Append the incoming user message and build the context window that ends with it.
    ///
    /// The window is read under the same session guard as the append, so a
    /// concurrent turn on the same session never lands inside it.
    pub fn append_and_build_context(
        &self,
        id: Option<&str>,
        content: &str,
    ) -> Result<(AppendOutcome, ContextWindow), SessionError> {
        let (outcome, history) = self.append_user_with(id, content, |sid| {
            self.store.append_with_history(sid, Role::User, content)
        })?;
        let window = self.context.build(&history);
        Ok((outcome, window))
    }

    pub fn delete_session(&self, id: &str) -> bool {
        let existed = self.store.delete(id);
        if existed {
            self.observer
                .record_event(&ObserverEvent::SessionsDeleted { count: 1 });
        }
        existed
    }

    pub fn delete_all_sessions(&self) -> usize {
        let removed = self.store.delete_all();
        self.observer
            .record_event(&ObserverEvent::SessionsDeleted { count: removed });
        removed
    }

    pub fn cleanup_expired(&self) -> SweepReport {
        let report = self.store.cleanup();
        self.observer.record_event(&ObserverEvent::SessionsSwept {
            removed: report.removed,
            skipped: report.skipped,
        });
        report
    }

    pub fn stats(&self) -> SessionStats {
        let stats = SessionStats::compute(&self.store.list(), &self.store.policy(), Utc::now());
        self.observer.record_metric(&ObserverMetric::SessionSnapshot {
            total: stats.total as u64,
            active: stats.active as u64,
            expired: stats.expired as u64,
        });
        stats
    }
}

impl Default for SessionService {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default(), Arc::new(NoopObserver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::context::ContextLimits;
    use chrono::Duration;

    const TTL_SECS: u64 = 3600;

    fn service_with_store() -> (SessionService, Arc<InMemorySessionStore>) {
        let policy = ExpirationPolicy::from_secs(TTL_SECS);
        let store = Arc::new(InMemorySessionStore::new(policy));
        let service = SessionService::new(
            store.clone(),
            ContextBuilder::new(ContextLimits {
                max_messages: 3,
                max_chars: 0,
            }),
            Arc::new(NoopObserver),
        );
        (service, store)
    }

    #[test]
    fn weather_scenario_round_trips() {
        let (service, _) = service_with_store();
        let session = service.create_session();
        assert!(session.messages.is_empty());

        let user = service
            .append_user_message(Some(&session.id), "What's the weather in London?")
            .unwrap();
        assert!(!user.created);
        assert_eq!(user.session_id, session.id);

        let reply = service
            .append_assistant_message(&session.id, "It's 15°C and cloudy.")
            .unwrap();

        let fetched = service.get_session(&session.id).unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[0].role, Role::User);
        assert_eq!(fetched.messages[0].content, "What's the weather in London?");
        assert_eq!(fetched.messages[1].role, Role::Assistant);
        assert_eq!(fetched.messages[1].content, "It's 15°C and cloudy.");
        assert_eq!(fetched.last_activity, reply.created_at);
    }

    #[test]
    fn append_without_id_creates_session() {
        let (service, _) = service_with_store();
        let outcome = service.append_user_message(None, "hi").unwrap();
        assert!(outcome.created);

        let session = service.get_session(&outcome.session_id).unwrap();
        assert_eq!(session.messages, vec![outcome.message]);
    }

    #[test]
    fn append_with_unknown_id_creates_session() {
        let (service, _) = service_with_store();
        let outcome = service.append_user_message(Some("stale-id"), "hi").unwrap();
        assert!(outcome.created);
        assert_ne!(outcome.session_id, "stale-id");
    }

    #[test]
    fn blank_message_creates_nothing() {
        let (service, _) = service_with_store();
        let result = service.append_user_message(None, "  ");
        assert!(matches!(result, Err(SessionError::InvalidInput(_))));
        assert!(service.list_sessions().is_empty());
    }

    #[test]
    fn assistant_append_requires_existing_session() {
        let (service, _) = service_with_store();
        let result = service.append_assistant_message("missing", "reply");
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn failed_turn_leaves_user_message_and_later_turn_appends_after_it() {
        let (service, _) = service_with_store();
        let first = service.append_user_message(None, "Will it rain?").unwrap();
        // Agent failed: no assistant message appended.
        let after_failure = service.get_session(&first.session_id).unwrap();
        assert_eq!(after_failure.messages, vec![first.message.clone()]);

        let retry = service
            .append_user_message(Some(&first.session_id), "Will it rain today?")
            .unwrap();
        service
            .append_assistant_message(&first.session_id, "Light showers after 3pm.")
            .unwrap();

        let session = service.get_session(&first.session_id).unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0], first.message);
        assert_eq!(session.messages[1], retry.message);
        assert_eq!(session.messages[2].role, Role::Assistant);
    }

    #[test]
    fn ttl_expiry_hides_and_sweeps_session() {
        let (service, store) = service_with_store();
        let stale = service.create_session();
        let fresh = service.create_session();
        store.backdate(&stale.id, Duration::seconds(TTL_SECS as i64 + 1));

        let stats = service.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 1);

        let report = service.cleanup_expired();
        assert_eq!(report.removed, 1);
        assert!(service.get_session(&stale.id).is_err());
        assert!(service.get_session(&fresh.id).is_ok());
    }

    #[test]
    fn lazy_expiry_returns_not_found() {
        let (service, store) = service_with_store();
        let stale = service.create_session();
        store.backdate(&stale.id, Duration::seconds(TTL_SECS as i64 + 5));
        assert!(matches!(
            service.get_session(&stale.id),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn stats_are_consistent_with_listing() {
        let (service, store) = service_with_store();
        for i in 0..5 {
            let s = service.create_session();
            if i % 2 == 0 {
                store.backdate(&s.id, Duration::hours(2));
            }
        }
        let stats = service.stats();
        assert_eq!(stats.active + stats.expired, stats.total);
        assert_eq!(stats.total, service.list_sessions().len());
        assert_eq!(stats.expired, 3);
    }

    #[test]
    fn delete_all_twice() {
        let (service, _) = service_with_store();
        for _ in 0..4 {
            service.create_session();
        }
        assert_eq!(service.delete_all_sessions(), 4);
        assert!(service.list_sessions().is_empty());
        assert_eq!(service.delete_all_sessions(), 0);
    }

    #[test]
    fn delete_one_of_two() {
        let (service, _) = service_with_store();
        let a = service.create_session();
        let b = service.create_session();

        assert!(service.delete_session(&a.id));
        let listed = service.list_sessions();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, b.id);
        assert!(!service.delete_session(&a.id));
    }

    #[test]
    fn list_active_skips_expired_and_limits() {
        let (service, store) = service_with_store();
        let stale = service.create_session();
        store.backdate(&stale.id, Duration::hours(3));
        for _ in 0..3 {
            service.create_session();
        }

        let active = service.list_active_sessions(10);
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|s| s.id != stale.id));
        assert_eq!(service.list_active_sessions(2).len(), 2);
    }

    #[test]
    fn history_returns_most_recent_messages() {
        let (service, _) = service_with_store();
        let first = service.append_user_message(None, "m0").unwrap();
        for i in 1..6 {
            service
                .append_user_message(Some(&first.session_id), &format!("m{i}"))
                .unwrap();
        }
        let recent = service.history(&first.session_id, 2).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m5"]);
        assert_eq!(service.history(&first.session_id, 0).unwrap().len(), 6);
    }

    #[test]
    fn context_window_is_bounded_but_history_is_not() {
        let (service, _) = service_with_store();
        let first = service.append_user_message(None, "q0").unwrap();
        for i in 1..5 {
            service
                .append_user_message(Some(&first.session_id), &format!("q{i}"))
                .unwrap();
        }

        let (outcome, window) = service
            .append_and_build_context(Some(&first.session_id), "q5")
            .unwrap();
        assert_eq!(window.messages.len(), 3);
        assert_eq!(window.dropped, 3);
        assert_eq!(window.latest().unwrap(), &outcome.message);
        assert_eq!(service.get_session(&first.session_id).unwrap().messages.len(), 6);
    }

    #[test]
    fn concurrent_turns_each_see_their_own_message_last() {
        let (service, _) = service_with_store();
        let service = Arc::new(service);
        let id = service.create_session().id;
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                std::thread::spawn(move || {
                    for round in 0..250 {
                        barrier.wait();
                        let (outcome, window) = service
                            .append_and_build_context(Some(&id), &format!("r{round}-t{t}"))
                            .unwrap();
                        assert!(!outcome.created);
                        assert_eq!(window.latest(), Some(&outcome.message));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(service.get_session(&id).unwrap().messages.len(), 2000);
    }

    #[test]
    fn append_and_build_context_on_unknown_id_starts_fresh() {
        let (service, _) = service_with_store();
        let (outcome, window) = service
            .append_and_build_context(Some("gone"), "hello")
            .unwrap();
        assert!(outcome.created);
        assert_ne!(outcome.session_id, "gone");
        assert_eq!(window.messages, vec![outcome.message]);
    }

    #[test]
    fn policy_comes_from_store() {
        let store = Arc::new(InMemorySessionStore::new(ExpirationPolicy::from_secs(90)));
        let service = SessionService::new(
            store.clone(),
            ContextBuilder::default(),
            Arc::new(NoopObserver),
        );
        assert_eq!(service.policy(), ExpirationPolicy::from_secs(90));

        let stale = service.create_session();
        service.create_session();
        store.backdate(&stale.id, Duration::seconds(91));

        // stats and active listing agree with get()
        assert_eq!(service.stats().expired, 1);
        assert_eq!(service.list_active_sessions(10).len(), 1);
        assert!(service.get_session(&stale.id).is_err());
    }
}
