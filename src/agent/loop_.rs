use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::llm::LlmWeatherAgent;
use super::prompt::with_location_hint;
use super::traits::{AgentRequest, WeatherAgent};
use crate::config::Config;
use crate::observability::{Observer, ObserverEvent};
use crate::providers;
use crate::sessions::{Message, SessionError, SessionService};
use crate::weather::{
    self, AirQualityReport, Coordinates, WeatherReport, WeatherSource, UNKNOWN_LOCATION,
};

/// Where a turn ended up.
///
/// `Pending` covers the window between the user message being stored and the
/// agent answering. A failed turn keeps its user message and is retried by
/// sending a new one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Pending,
    Complete,
    Failed,
}

impl TurnState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// One inbound chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "userLocation")]
    pub user_location: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: String,
    /// `true` when this turn started a new session.
    pub created: bool,
    pub state: TurnState,
    pub user_message: Message,
    pub reply: Option<Message>,
    pub failure: Option<String>,
    pub city: Option<String>,
    pub used_location: bool,
    pub weather: Option<WeatherReport>,
    pub air_quality: Option<AirQualityReport>,
    /// Older messages left out of the agent's context window.
    pub context_dropped: usize,
}

/// Applies chat turns: store the user message, ask the agent, store the reply.
pub struct ChatService {
    sessions: Arc<SessionService>,
    agent: Arc<dyn WeatherAgent>,
    weather: Option<Arc<dyn WeatherSource>>,
    air_quality: bool,
    observer: Arc<dyn Observer>,
    agent_timeout: Duration,
}

impl ChatService {
    pub fn new(
        sessions: Arc<SessionService>,
        agent: Arc<dyn WeatherAgent>,
        weather: Option<Arc<dyn WeatherSource>>,
        observer: Arc<dyn Observer>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            agent,
            weather,
            air_quality: true,
            observer,
            agent_timeout,
        }
    }

    /// Turn air quality lookups on or off. On by default.
    pub fn with_air_quality(mut self, enabled: bool) -> Self {
        self.air_quality = enabled;
        self
    }

    /// Wire the configured provider and weather source around `sessions`.
    pub fn from_config(
        config: &Config,
        sessions: Arc<SessionService>,
        observer: Arc<dyn Observer>,
    ) -> anyhow::Result<Self> {
        let provider: Arc<dyn providers::Provider> = Arc::from(providers::create_provider(config)?);
        let agent = LlmWeatherAgent::from_config(config, provider);
        let weather = weather::create_weather_source(&config.weather);
        if weather.is_none() {
            tracing::warn!("no weather API key configured; replies will not include live data");
        }
        Ok(Self::new(
            sessions,
            Arc::new(agent),
            weather,
            observer,
            Duration::from_secs(config.agent.timeout_secs),
        )
        .with_air_quality(config.weather.air_quality))
    }

    pub fn sessions(&self) -> &Arc<SessionService> {
        &self.sessions
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    pub fn has_weather_source(&self) -> bool {
        self.weather.is_some()
    }

    /// Resolve the city for a turn. Returns `(city, used_location)`.
    async fn resolve_city(&self, request: &TurnRequest) -> (Option<String>, bool) {
        if let Some(city) = request
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            return (Some(city.to_string()), false);
        }

        let Some(coords) = request.user_location else {
            return (None, false);
        };

        let resolved = match &self.weather {
            Some(source) => match source.city_for(coords).await {
                Ok(Some(city)) => city,
                Ok(None) => UNKNOWN_LOCATION.to_string(),
                Err(e) => {
                    tracing::warn!("reverse geocoding failed: {e}");
                    UNKNOWN_LOCATION.to_string()
                }
            },
            None => UNKNOWN_LOCATION.to_string(),
        };
        (Some(resolved), true)
    }

    async fn lookup_weather(&self, city: Option<&str>) -> Option<WeatherReport> {
        let city = city.filter(|c| *c != UNKNOWN_LOCATION)?;
        let source = self.weather.as_ref()?;
        match source.current(city).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(city, "weather lookup failed: {e}");
                self.observer.record_event(&ObserverEvent::Error {
                    component: "weather".into(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    async fn lookup_air_quality(&self, city: Option<&str>) -> Option<AirQualityReport> {
        if !self.air_quality {
            return None;
        }
        let city = city.filter(|c| *c != UNKNOWN_LOCATION)?;
        let source = self.weather.as_ref()?;
        match source.air_quality(city).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(city, "air quality lookup failed: {e}");
                self.observer.record_event(&ObserverEvent::Error {
                    component: "air_quality".into(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Run one turn.
    ///
    /// The user message is stored before any external call. Agent errors and
    /// timeouts come back as `Ok` with [`TurnState::Failed`]; only session
    /// errors are returned as `Err`.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome, SessionError> {
        let started = Instant::now();
        let (appended, window) = self
            .sessions
            .append_and_build_context(request.session_id.as_deref(), &request.message)?;
        let session_id = appended.session_id.clone();
        let mut state = TurnState::Pending;
        tracing::debug!(
            session_id = %session_id,
            created = appended.created,
            context = window.messages.len(),
            dropped = window.dropped,
            state = state.as_str(),
            "user message stored"
        );

        let (city, used_location) = self.resolve_city(&request).await;
        let (weather, air_quality) = tokio::join!(
            self.lookup_weather(city.as_deref()),
            self.lookup_air_quality(city.as_deref()),
        );

        let agent_request = AgentRequest {
            query: with_location_hint(&request.message, city.as_deref()),
            history: window.messages,
            city: city.clone(),
            weather: weather.clone(),
            air_quality: air_quality.clone(),
        };

        let call = self.agent.respond(&agent_request);
        let result = match tokio::time::timeout(self.agent_timeout, call).await {
            Ok(Ok(reply)) if reply.text.trim().is_empty() => {
                Err("agent returned an empty reply".to_string())
            }
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("agent timed out after {:?}", self.agent_timeout)),
        };

        let (reply, failure) = match result {
            Ok(reply) => {
                let message = self
                    .sessions
                    .append_assistant_message(&session_id, &reply.text)?;
                state = TurnState::Complete;
                self.observer.record_event(&ObserverEvent::TurnCompleted {
                    duration: started.elapsed(),
                });
                (Some(message), None)
            }
            Err(reason) => {
                state = TurnState::Failed;
                tracing::warn!(session_id = %session_id, "turn failed: {reason}");
                self.observer.record_event(&ObserverEvent::TurnFailed {
                    duration: started.elapsed(),
                    reason: reason.clone(),
                });
                (None, Some(reason))
            }
        };

        tracing::info!(
            session_id = %session_id,
            state = state.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn finished"
        );

        Ok(TurnOutcome {
            session_id,
            created: appended.created,
            state,
            user_message: appended.message,
            reply,
            failure,
            city,
            used_location,
            weather,
            air_quality,
            context_dropped: window.dropped,
        })
    }
}
