use super::traits::{Observer, ObserverEvent, ObserverMetric};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Turn latencies span fast cache hits through slow model calls.
const TURN_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

/// Prometheus-backed observer with its own registry, rendered at `/metrics`.
pub struct PrometheusObserver {
    registry: Registry,
    sessions_created: IntCounterVec,
    sessions_deleted: IntCounter,
    sessions_expired: IntCounter,
    turns: IntCounterVec,
    turn_duration: Histogram,
    request_latency: Histogram,
    sessions: IntGaugeVec,
    errors: IntCounterVec,
}

impl PrometheusObserver {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("skycast".to_string()), None)?;

        let sessions_created = IntCounterVec::new(
            Opts::new("sessions_created_total", "Sessions created, by origin"),
            &["origin"],
        )?;
        let sessions_deleted =
            IntCounter::new("sessions_deleted_total", "Sessions removed by explicit delete")?;
        let sessions_expired =
            IntCounter::new("sessions_expired_total", "Sessions removed by expiration sweeps")?;
        let turns = IntCounterVec::new(
            Opts::new("turns_total", "Chat turns, by final state"),
            &["state"],
        )?;
        let turn_duration = Histogram::with_opts(
            HistogramOpts::new("turn_duration_seconds", "Wall time of a chat turn")
                .buckets(TURN_BUCKETS.to_vec()),
        )?;
        let request_latency = Histogram::with_opts(HistogramOpts::new(
            "request_latency_seconds",
            "Gateway request latency",
        ))?;
        let sessions = IntGaugeVec::new(
            Opts::new("sessions", "Stored sessions at last snapshot, by state"),
            &["state"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Errors reported, by component"),
            &["component"],
        )?;

        registry.register(Box::new(sessions_created.clone()))?;
        registry.register(Box::new(sessions_deleted.clone()))?;
        registry.register(Box::new(sessions_expired.clone()))?;
        registry.register(Box::new(turns.clone()))?;
        registry.register(Box::new(turn_duration.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(sessions.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            sessions_created,
            sessions_deleted,
            sessions_expired,
            turns,
            turn_duration,
            request_latency,
            sessions,
            errors,
        })
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn as_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Observer for PrometheusObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::SessionCreated { implicit } => {
                let origin = if *implicit { "implicit" } else { "explicit" };
                self.sessions_created.with_label_values(&[origin]).inc();
            }
            ObserverEvent::SessionsDeleted { count } => {
                self.sessions_deleted.inc_by(as_u64(*count));
            }
            ObserverEvent::SessionsSwept { removed, .. } => {
                self.sessions_expired.inc_by(as_u64(*removed));
            }
            ObserverEvent::TurnCompleted { duration } => {
                self.turns.with_label_values(&["complete"]).inc();
                self.turn_duration.observe(duration.as_secs_f64());
            }
            ObserverEvent::TurnFailed { duration, .. } => {
                self.turns.with_label_values(&["failed"]).inc();
                self.turn_duration.observe(duration.as_secs_f64());
            }
            ObserverEvent::Error { component, .. } => {
                self.errors.with_label_values(&[component.as_str()]).inc();
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                self.request_latency.observe(d.as_secs_f64());
            }
            ObserverMetric::SessionSnapshot {
                total,
                active,
                expired,
            } => {
                self.sessions.with_label_values(&["total"]).set(as_i64(*total));
                self.sessions.with_label_values(&["active"]).set(as_i64(*active));
                self.sessions
                    .with_label_values(&["expired"])
                    .set(as_i64(*expired));
            }
        }
    }

    fn render(&self) -> Option<String> {
        match TextEncoder::new().encode_to_string(&self.registry.gather()) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Failed to encode metrics: {e}");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn prometheus_observer_name() {
        assert_eq!(PrometheusObserver::new().unwrap().name(), "prometheus");
    }

    #[test]
    fn renders_recorded_counters() {
        let obs = PrometheusObserver::new().unwrap();
        obs.record_event(&ObserverEvent::SessionCreated { implicit: false });
        obs.record_event(&ObserverEvent::SessionCreated { implicit: true });
        obs.record_event(&ObserverEvent::SessionsSwept {
            removed: 3,
            skipped: 1,
        });
        obs.record_event(&ObserverEvent::TurnFailed {
            duration: Duration::from_secs(2),
            reason: "timeout".into(),
        });

        let text = obs.render().unwrap();
        assert!(text.contains("skycast_sessions_created_total{origin=\"explicit\"} 1"));
        assert!(text.contains("skycast_sessions_created_total{origin=\"implicit\"} 1"));
        assert!(text.contains("skycast_sessions_expired_total 3"));
        assert!(text.contains("skycast_turns_total{state=\"failed\"} 1"));
    }

    #[test]
    fn snapshot_gauges_overwrite() {
        let obs = PrometheusObserver::new().unwrap();
        obs.record_metric(&ObserverMetric::SessionSnapshot {
            total: 5,
            active: 4,
            expired: 1,
        });
        obs.record_metric(&ObserverMetric::SessionSnapshot {
            total: 2,
            active: 2,
            expired: 0,
        });

        let text = obs.render().unwrap();
        assert!(text.contains("skycast_sessions{state=\"total\"} 2"));
        assert!(text.contains("skycast_sessions{state=\"expired\"} 0"));
    }
}
