//! Language model backends.
//!
//! Every backend implements [`Provider`]. Skycast talks to any OpenAI-compatible
//! chat completions endpoint; the default is Gemini's compatibility layer.

pub mod compatible;
pub mod traits;

pub use compatible::{AuthStyle, OpenAiCompatibleProvider};
pub use traits::{ChatMessage, Provider};

use crate::config::Config;

const MAX_API_ERROR_CHARS: usize = 200;

/// Base URL used when `api_url` is not configured.
pub const DEFAULT_PROVIDER_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Covers OpenAI-style `sk-` keys, Google `AIza` keys and `key=`/`appid=` query values.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 4] = ["sk-", "AIza", "key=", "appid="];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let end = scrubbed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(scrubbed.len(), |(i, _)| i);

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

fn provider_name_for(url: &str) -> &'static str {
    if url.contains("generativelanguage.googleapis.com") {
        "gemini"
    } else if url.contains("api.openai.com") {
        "openai"
    } else {
        "compatible"
    }
}

/// Factory: build the configured chat backend.
pub fn create_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    let url = config
        .api_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_PROVIDER_URL);

    reqwest::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid api_url {url:?}: {e}"))?;

    let key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    tracing::debug!(url, has_key = key.is_some(), "creating chat provider");

    Ok(Box::new(
        OpenAiCompatibleProvider::new(provider_name_for(url), url, key, AuthStyle::Bearer)
            .with_max_tokens(config.agent.max_output_tokens),
    ))
}
