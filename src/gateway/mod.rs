//! Axum HTTP gateway for chat turns and session management.
//!
//! Body size and request duration are capped by tower-http layers.

pub mod api;

use crate::agent::ChatService;
use crate::config::{Config, GatewayConfig};
use crate::infra::SessionSweeper;
use crate::observability::{self, Observer};
use crate::sessions::SessionService;
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub observer: Arc<dyn Observer>,
    pub model: String,
    pub llm_key_configured: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn sessions(&self) -> &SessionService {
        self.chat.sessions()
    }
}

fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Build the router with body-limit and timeout layers applied.
pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route(
            "/api/sessions",
            post(api::handle_create_session)
                .get(api::handle_list_sessions)
                .delete(api::handle_delete_all_sessions),
        )
        .route("/api/sessions/stats", get(api::handle_session_stats))
        .route("/api/sessions/cleanup", post(api::handle_cleanup_sessions))
        .route(
            "/api/sessions/{id}",
            get(api::handle_get_session).delete(api::handle_delete_session),
        )
        .route("/api/sessions/{id}/history", get(api::handle_session_history))
        .route("/api/chat", post(api::handle_chat))
        .route("/api/health", get(api::handle_health))
        .route("/metrics", get(api::handle_metrics))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;

    if is_public_bind(&host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the gateway would be reachable from other machines.\n\
             Fix: use --host 127.0.0.1 (default) or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let observer: Arc<dyn Observer> = Arc::from(observability::create_observer(&config.observability));
    let sessions = Arc::new(SessionService::from_config(&config.sessions, observer.clone()));
    let chat = Arc::new(ChatService::from_config(&config, sessions.clone(), observer.clone())?);

    let state = AppState {
        chat,
        observer,
        model: config
            .default_model
            .clone()
            .unwrap_or_else(|| "gemini-2.5-flash".into()),
        llm_key_configured: config.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()),
        started_at: Instant::now(),
    };

    let app = build_router(state, &config.gateway);

    let bind_host = host.trim_start_matches('[').trim_end_matches(']');
    let listener = tokio::net::TcpListener::bind((bind_host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;

    tracing::info!(addr = %listener.local_addr()?, "gateway listening");

    let sweeper = SessionSweeper::new(
        sessions,
        Duration::from_secs(config.sessions.cleanup_interval_secs),
    )
    .spawn();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down gateway");
        })
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_are_private() {
        assert!(!is_public_bind("127.0.0.1"));
        assert!(!is_public_bind("localhost"));
        assert!(!is_public_bind("::1"));
        assert!(is_public_bind("0.0.0.0"));
        assert!(is_public_bind("192.168.1.20"));
    }

    #[tokio::test]
    async fn refuses_public_bind_without_opt_in() {
        let mut config = Config::default();
        config.gateway.host = "0.0.0.0".into();
        let err = run_gateway(config).await.unwrap_err();
        assert!(err.to_string().contains("Refusing to bind"));
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
