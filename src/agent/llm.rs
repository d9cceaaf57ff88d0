use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::prompt::build_messages;
use super::traits::{AgentReply, AgentRequest, WeatherAgent};
use crate::config::Config;
use crate::providers::Provider;

/// Answers weather questions through a chat completions provider.
pub struct LlmWeatherAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl LlmWeatherAgent {
    pub fn new(provider: Arc<dyn Provider>, model: &str, temperature: f64) -> Self {
        Self {
            provider,
            model: model.to_string(),
            temperature,
        }
    }

    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Self {
        Self::new(
            provider,
            config.default_model.as_deref().unwrap_or("gemini-2.5-flash"),
            config.default_temperature,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl WeatherAgent for LlmWeatherAgent {
    async fn respond(&self, request: &AgentRequest) -> Result<AgentReply> {
        let messages = build_messages(request);
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "calling provider"
        );
        let text = self
            .provider
            .chat_with_history(&messages, &self.model, self.temperature)
            .await?;
        Ok(AgentReply {
            text: text.trim().to_string(),
            model: Some(self.model.clone()),
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}
