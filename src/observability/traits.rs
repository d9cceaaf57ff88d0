use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    SessionCreated {
        implicit: bool,
    },
    SessionsDeleted {
        count: usize,
    },
    SessionsSwept {
        removed: usize,
        skipped: usize,
    },
    TurnCompleted {
        duration: Duration,
    },
    TurnFailed {
        duration: Duration,
        reason: String,
    },
    Error {
        component: String,
        message: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    RequestLatency(Duration),
    SessionSnapshot {
        total: u64,
        active: u64,
        expired: u64,
    },
}

/// Core observability trait — implement for any backend
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Text exposition of collected metrics, for backends that keep them.
    fn render(&self) -> Option<String> {
        None
    }

    fn name(&self) -> &str;
}
