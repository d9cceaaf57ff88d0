//! Session and turn observability backends.

pub mod log;
pub mod noop;
pub mod prometheus;
pub mod traits;

pub use self::log::LogObserver;
pub use self::prometheus::PrometheusObserver;
pub use noop::NoopObserver;
pub use traits::{Observer, ObserverEvent, ObserverMetric};

use crate::config::ObservabilityConfig;

/// Factory: create the right observer from config
pub fn create_observer(config: &ObservabilityConfig) -> Box<dyn Observer> {
    match config.backend.as_str() {
        "log" => Box::new(LogObserver::new()),
        "prometheus" => match PrometheusObserver::new() {
            Ok(observer) => Box::new(observer),
            Err(e) => {
                tracing::warn!("Failed to initialise prometheus registry ({e}), falling back to log");
                Box::new(LogObserver::new())
            }
        },
        "none" | "noop" => Box::new(NoopObserver),
        _ => {
            tracing::warn!(
                "Unknown observability backend '{}', falling back to noop",
                config.backend
            );
            Box::new(NoopObserver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str) -> ObservabilityConfig {
        ObservabilityConfig {
            backend: backend.into(),
        }
    }

    #[test]
    fn factory_none_returns_noop() {
        assert_eq!(create_observer(&config("none")).name(), "noop");
        assert_eq!(create_observer(&config("noop")).name(), "noop");
    }

    #[test]
    fn factory_log_returns_log() {
        assert_eq!(create_observer(&config("log")).name(), "log");
    }

    #[test]
    fn factory_prometheus_returns_prometheus() {
        let observer = create_observer(&config("prometheus"));
        assert_eq!(observer.name(), "prometheus");
        assert!(observer.render().is_some());
    }

    #[test]
    fn factory_unknown_falls_back_to_noop() {
        assert_eq!(create_observer(&config("xyzzy_garbage_123")).name(), "noop");
        assert_eq!(create_observer(&config("")).name(), "noop");
    }
}
