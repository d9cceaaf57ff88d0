use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::{info, warn};

/// Log-based observer — uses tracing, zero external deps
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(duration: &std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::SessionCreated { implicit } => {
                info!(implicit = implicit, "session.created");
            }
            ObserverEvent::SessionsDeleted { count } => {
                info!(count = count, "session.deleted");
            }
            ObserverEvent::SessionsSwept { removed, skipped } => {
                info!(removed = removed, skipped = skipped, "session.swept");
            }
            ObserverEvent::TurnCompleted { duration } => {
                info!(duration_ms = millis(duration), "turn.complete");
            }
            ObserverEvent::TurnFailed { duration, reason } => {
                warn!(duration_ms = millis(duration), reason = %reason, "turn.failed");
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                info!(latency_ms = millis(d), "metric.request_latency");
            }
            ObserverMetric::SessionSnapshot {
                total,
                active,
                expired,
            } => {
                info!(
                    total = total,
                    active = active,
                    expired = expired,
                    "metric.sessions"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn log_observer_name() {
        assert_eq!(LogObserver::new().name(), "log");
    }

    #[test]
    fn log_observer_accepts_all_events() {
        let obs = LogObserver::new();
        obs.record_event(&ObserverEvent::SessionCreated { implicit: true });
        obs.record_event(&ObserverEvent::SessionsDeleted { count: 2 });
        obs.record_event(&ObserverEvent::SessionsSwept {
            removed: 1,
            skipped: 0,
        });
        obs.record_event(&ObserverEvent::TurnCompleted {
            duration: Duration::from_millis(120),
        });
        obs.record_event(&ObserverEvent::TurnFailed {
            duration: Duration::from_secs(30),
            reason: "timeout".into(),
        });
        obs.record_metric(&ObserverMetric::RequestLatency(Duration::from_millis(5)));
        assert!(obs.render().is_none());
    }
}
