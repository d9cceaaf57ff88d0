//! Agent seam: whatever turns a bounded history into a weather answer.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::sessions::Message;
use crate::weather::{AirQualityReport, WeatherReport};

/// Weather assistant interface.
///
/// Implementations receive the context window and return reply text. They
/// never touch the session store; the caller appends the reply.
#[async_trait]
pub trait WeatherAgent: Send + Sync {
    async fn respond(&self, request: &AgentRequest) -> Result<AgentReply>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Context window, oldest first. The last entry is the stored user message.
    pub history: Vec<Message>,
    /// What the model sees for the current turn (user text plus location hint).
    pub query: String,
    pub city: Option<String>,
    pub weather: Option<WeatherReport>,
    #[serde(default)]
    pub air_quality: Option<AirQualityReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub model: Option<String>,
}
