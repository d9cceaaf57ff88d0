use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sessions::{SessionService, SweepReport};

/// Periodically removes expired sessions.
pub struct SessionSweeper {
    sessions: Arc<SessionService>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionService>, interval: Duration) -> Self {
        Self { sessions, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep now.
    pub fn tick(&self) -> SweepReport {
        tracing::debug!("running scheduled session sweep");
        self.sessions.cleanup_expired()
    }

    /// Sweep every `interval` until the task is aborted. A zero interval disables the task.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            tracing::info!("session sweeper disabled");
            return None;
        }
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.tick();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopObserver;
    use crate::sessions::{
        ContextBuilder, ExpirationPolicy, InMemorySessionStore, SessionService,
    };

    fn service() -> (Arc<SessionService>, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new(ExpirationPolicy::from_secs(60)));
        let service = SessionService::new(
            store.clone(),
            ContextBuilder::default(),
            Arc::new(NoopObserver),
        );
        (Arc::new(service), store)
    }

    #[test]
    fn tick_removes_expired_sessions() {
        let (sessions, store) = service();
        let stale = sessions.create_session();
        sessions.create_session();
        store.backdate(&stale.id, chrono::Duration::seconds(61));

        let sweeper = SessionSweeper::new(sessions.clone(), Duration::from_secs(3600));
        assert_eq!(sweeper.tick().removed, 1);
        assert_eq!(sessions.list_sessions().len(), 1);
        assert_eq!(sweeper.tick().removed, 0);
    }

    #[test]
    fn zero_interval_does_not_spawn() {
        let (sessions, _) = service();
        assert!(SessionSweeper::new(sessions, Duration::ZERO).spawn().is_none());
    }

    #[tokio::test]
    async fn spawned_task_sweeps_on_interval() {
        let (sessions, store) = service();
        let stale = sessions.create_session();
        store.backdate(&stale.id, chrono::Duration::seconds(120));

        let handle = SessionSweeper::new(sessions.clone(), Duration::from_millis(20))
            .spawn()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(sessions.list_sessions().is_empty());
        handle.abort();
    }
}
