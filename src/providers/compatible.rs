//! OpenAI-compatible chat completions client.
//! Gemini, OpenAI, Groq and most hosted models accept the same `/chat/completions` shape.

use crate::providers::traits::{ChatMessage, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) auth_header: AuthStyle,
    max_tokens: Option<u32>,
    client: Client,
}

/// How the provider expects the API key to be sent.
#[derive(Debug, Clone)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>`
    XApiKey,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, auth_style: AuthStyle) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            auth_header: auth_style,
            max_tokens: None,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = (max_tokens > 0).then_some(max_tokens);
        self
    }

    /// Build the chat completions URL, keeping `base_url` as-is when it already names the endpoint.
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| self.base_url.ends_with("/chat/completions"));

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn apply_auth_header(
        &self,
        req: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        match &self.auth_header {
            AuthStyle::Bearer => req.header("Authorization", format!("Bearer {api_key}")),
            AuthStyle::XApiKey => req.header("x-api-key", api_key),
        }
    }

    fn require_key(&self) -> anyhow::Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Set SKYCAST_API_KEY or api_key in config.toml.",
                self.name
            )
        })
    }

    async fn send(&self, messages: Vec<ApiMessage>, model: &str, temperature: f64) -> anyhow::Result<String> {
        let api_key = self.require_key()?;
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
            max_tokens: self.max_tokens,
            stream: Some(false),
        };

        let response = self
            .apply_auth_header(self.client.post(self.chat_completions_url()).json(&request), api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let chat_response: ApiChatResponse = response.json().await?;
        first_choice_text(chat_response)
            .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_text(response: ApiChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system_prompt {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: sys.to_string(),
            });
        }
        messages.push(ApiMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });
        self.send(messages, model, temperature).await
    }

    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let api_messages = messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();
        self.send(api_messages, model, temperature).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider(url: &str, key: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new("gemini", url, key, AuthStyle::Bearer)
    }

    #[test]
    fn creates_with_key() {
        let p = make_provider(
            "https://generativelanguage.googleapis.com/v1beta/openai",
            Some("g-key"),
        );
        assert_eq!(p.name, "gemini");
        assert_eq!(p.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn strips_trailing_slash() {
        let p = make_provider("https://example.com/", None);
        assert_eq!(p.base_url, "https://example.com");
    }

    #[tokio::test]
    async fn chat_fails_without_key() {
        let p = make_provider("https://example.com", None);
        let err = p
            .chat_with_system(None, "hello", "gemini-2.5-flash", 0.1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gemini API key not set"));
    }

    #[tokio::test]
    async fn history_fails_without_key() {
        let p = make_provider("https://example.com", None);
        let result = p
            .chat_with_history(&[ChatMessage::user("hi")], "gemini-2.5-flash", 0.1)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn chat_completions_url_appends_path() {
        let p = make_provider("https://generativelanguage.googleapis.com/v1beta/openai", None);
        assert_eq!(
            p.chat_completions_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn chat_completions_url_keeps_full_endpoint() {
        let p = make_provider("https://api.example.com/v1/chat/completions", None);
        assert_eq!(
            p.chat_completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn request_omits_unset_max_tokens() {
        let req = ChatRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "hello".into(),
            }],
            temperature: 0.1,
            max_tokens: None,
            stream: Some(false),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("gemini-2.5-flash"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn zero_max_tokens_means_unset() {
        let p = make_provider("https://example.com", None).with_max_tokens(0);
        assert!(p.max_tokens.is_none());
        let p = make_provider("https://example.com", None).with_max_tokens(1000);
        assert_eq!(p.max_tokens, Some(1000));
    }

    #[test]
    fn response_text_is_extracted() {
        let json = r#"{"choices":[{"message":{"content":"Sunny, 22°C."}}]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_choice_text(resp).as_deref(), Some("Sunny, 22°C."));
    }

    #[test]
    fn empty_choices_yield_none() {
        let resp: ApiChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice_text(resp).is_none());
    }
}
