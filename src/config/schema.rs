use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::sessions::{ContextLimits, ExpirationPolicy};

// ── Top-level config ──────────────────────────────────────────────

/// Top-level Skycast configuration, loaded from `config.toml`.
///
/// Resolution order: `SKYCAST_CONFIG_DIR` env (set by `--config-dir`) → `~/.skycast/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the language model endpoint. Overridden by `SKYCAST_API_KEY`, `API_KEY` or `GOOGLE_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible chat completions API.
    /// Default: the Gemini OpenAI-compatible endpoint.
    pub api_url: Option<String>,
    /// Model routed through the endpoint (e.g. `"gemini-2.5-flash"`).
    pub default_model: Option<String>,
    /// Model temperature (0.0–2.0). Default: `0.1`.
    pub default_temperature: f64,

    /// Gateway server configuration: host, port, limits (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session lifetime and context window settings (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Agent call settings (`[agent]`).
    #[serde(default)]
    pub agent: AgentConfig,

    /// Weather data source settings (`[weather]`).
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Observability backend configuration (`[observability]`).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Gateway ──────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Allow binding to non-localhost addresses (default: false)
    #[serde(default)]
    pub allow_public_bind: bool,
    /// Maximum request body size in bytes (default: 64 KiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Per-request timeout in seconds. Must exceed `agent.timeout_secs`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_max_body_bytes() -> usize {
    65_536
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            allow_public_bind: false,
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Sessions ─────────────────────────────────────────────────────

/// Session lifetime and context configuration (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionsConfig {
    /// Inactivity before a session expires, in seconds. Default: `86400` (24h).
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval between background expiration sweeps. `0` disables the sweeper. Default: `3600`.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Most recent messages forwarded to the model per turn. `0` = unbounded. Default: `10`.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    /// Aggregate character budget of the forwarded history. `0` = unbounded. Default: `16000`.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Default page size when listing active sessions. Default: `50`.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_session_ttl_secs() -> u64 {
    crate::sessions::expiry::DEFAULT_SESSION_TTL_SECS
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_max_context_messages() -> usize {
    crate::sessions::context::DEFAULT_MAX_CONTEXT_MESSAGES
}

fn default_max_context_chars() -> usize {
    crate::sessions::context::DEFAULT_MAX_CONTEXT_CHARS
}

fn default_list_limit() -> usize {
    50
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            max_context_messages: default_max_context_messages(),
            max_context_chars: default_max_context_chars(),
            list_limit: default_list_limit(),
        }
    }
}

impl SessionsConfig {
    pub fn expiration_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy::from_secs(self.ttl_secs)
    }

    pub fn context_limits(&self) -> ContextLimits {
        ContextLimits {
            max_messages: self.max_context_messages,
            max_chars: self.max_context_chars,
        }
    }
}

// ── Agent ────────────────────────────────────────────────────────

/// Agent call configuration (`[agent]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentConfig {
    /// Upper bound on a single model call, in seconds. Default: `30`.
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum tokens the model may produce per reply. Default: `1000`.
    #[serde(default = "default_agent_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_agent_timeout_secs() -> u64 {
    30
}

fn default_agent_max_output_tokens() -> u32 {
    1000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_agent_timeout_secs(),
            max_output_tokens: default_agent_max_output_tokens(),
        }
    }
}

// ── Weather ──────────────────────────────────────────────────────

/// Weather data source configuration (`[weather]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key. Overridden by `SKYCAST_WEATHER_API_KEY` or `OPENWEATHER_API_KEY`.
    /// Weather enrichment is disabled when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// OpenWeatherMap base URL.
    #[serde(default = "default_weather_api_url")]
    pub api_url: String,
    /// How long fetched conditions are reused per city, in seconds. Default: `300`.
    #[serde(default = "default_weather_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Fetch air quality alongside conditions. Default: `true`.
    #[serde(default = "default_true")]
    pub air_quality: bool,
    /// How long air quality readings are reused per city, in seconds. Default: `600`.
    #[serde(default = "default_air_quality_cache_ttl_secs")]
    pub air_quality_cache_ttl_secs: u64,
}

fn default_weather_api_url() -> String {
    "https://api.openweathermap.org".into()
}

fn default_weather_cache_ttl_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_air_quality_cache_ttl_secs() -> u64 {
    600
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_weather_api_url(),
            cache_ttl_secs: default_weather_cache_ttl_secs(),
            air_quality: true,
            air_quality_cache_ttl_secs: default_air_quality_cache_ttl_secs(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

/// Observability backend configuration (`[observability]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObservabilityConfig {
    /// "none" | "log" | "prometheus"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "log".into(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".skycast").join("config.toml"),
            api_key: None,
            api_url: Some("https://generativelanguage.googleapis.com/v1beta/openai".to_string()),
            default_model: Some("gemini-2.5-flash".to_string()),
            default_temperature: 0.1,
            gateway: GatewayConfig::default(),
            sessions: SessionsConfig::default(),
            agent: AgentConfig::default(),
            weather: WeatherConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".skycast"))
}

/// Resolve the config directory: `SKYCAST_CONFIG_DIR` (with `~` expansion) wins.
fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("SKYCAST_CONFIG_DIR") {
        let custom = custom.trim();
        if !custom.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(custom).into_owned()));
        }
    }
    default_config_dir()
}

fn env_nonempty(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_in(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing defaults first if it does not exist.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            // Warn if config file is world-readable (may contain API keys)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }
        if self.gateway.request_timeout_secs <= self.agent.timeout_secs {
            anyhow::bail!(
                "gateway.request_timeout_secs ({}) must exceed agent.timeout_secs ({})",
                self.gateway.request_timeout_secs,
                self.agent.timeout_secs
            );
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!("default_temperature must be between 0.0 and 2.0");
        }
        if self.sessions.ttl_secs == 0 {
            anyhow::bail!("sessions.ttl_secs must be greater than 0");
        }
        if self.agent.timeout_secs == 0 {
            anyhow::bail!("agent.timeout_secs must be greater than 0");
        }
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = env_nonempty(&["SKYCAST_API_KEY", "API_KEY", "GOOGLE_API_KEY"]) {
            self.api_key = Some(key);
        }

        if let Some(url) = env_nonempty(&["SKYCAST_PROVIDER_URL"]) {
            self.api_url = Some(url);
        }

        if let Some(model) = env_nonempty(&["SKYCAST_MODEL", "MODEL"]) {
            self.default_model = Some(model);
        }

        if let Some(temp_str) = env_nonempty(&["SKYCAST_TEMPERATURE"]) {
            if let Ok(temp) = temp_str.parse::<f64>() {
                if (0.0..=2.0).contains(&temp) {
                    self.default_temperature = temp;
                }
            }
        }

        if let Some(key) = env_nonempty(&["SKYCAST_WEATHER_API_KEY", "OPENWEATHER_API_KEY"]) {
            self.weather.api_key = Some(key);
        }

        // Gateway port: SKYCAST_GATEWAY_PORT or PORT
        if let Some(port_str) = env_nonempty(&["SKYCAST_GATEWAY_PORT", "PORT"]) {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        // Gateway host: SKYCAST_GATEWAY_HOST or HOST
        if let Some(host) = env_nonempty(&["SKYCAST_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host;
        }

        if let Ok(val) = std::env::var("SKYCAST_ALLOW_PUBLIC_BIND") {
            self.gateway.allow_public_bind = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Some(ttl_str) = env_nonempty(&["SKYCAST_SESSION_TTL_SECS"]) {
            match ttl_str.parse::<u64>() {
                Ok(ttl) if ttl > 0 => self.sessions.ttl_secs = ttl,
                _ => tracing::warn!(value = %ttl_str, "Ignoring invalid SKYCAST_SESSION_TTL_SECS"),
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Mutex, MutexGuard};
    use tokio::test;

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    async fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.default_model.as_deref(), Some("gemini-2.5-flash"));
        assert!((c.default_temperature - 0.1).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
        assert!(c.config_path.to_string_lossy().contains("config.toml"));
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(c.sessions.ttl_secs, 86_400);
        assert_eq!(c.sessions.max_context_messages, 10);
        assert_eq!(c.sessions.list_limit, 50);
        assert_eq!(c.weather.cache_ttl_secs, 300);
        c.validate().unwrap();
    }

    #[test]
    async fn config_schema_export_contains_expected_contract_shape() {
        let schema = schemars::schema_for!(Config);
        let schema_json = serde_json::to_value(&schema).expect("schema should serialize to json");

        let properties = schema_json
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .expect("schema should expose top-level properties");

        assert!(properties.contains_key("default_model"));
        assert!(properties.contains_key("gateway"));
        assert!(properties.contains_key("sessions"));
        assert!(!properties.contains_key("config_path"));
    }

    #[test]
    async fn sessions_config_maps_to_policy_and_limits() {
        let cfg = SessionsConfig {
            ttl_secs: 120,
            max_context_messages: 4,
            max_context_chars: 800,
            ..SessionsConfig::default()
        };
        assert_eq!(cfg.expiration_policy().ttl(), chrono::Duration::seconds(120));
        assert_eq!(
            cfg.context_limits(),
            ContextLimits {
                max_messages: 4,
                max_chars: 800
            }
        );
    }

    // ── Serde round-trip ─────────────────────────────────────

    #[test]
    async fn config_minimal_toml_uses_defaults() {
        let minimal = r#"
default_temperature = 0.7
"#;
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert!(parsed.api_key.is_none());
        assert!(parsed.default_model.is_none());
        assert_eq!(parsed.observability.backend, "log");
        assert_eq!(parsed.sessions.cleanup_interval_secs, 3600);
        assert_eq!(parsed.agent.timeout_secs, 30);
        assert_eq!(parsed.gateway.host, "127.0.0.1");
        assert!(parsed.weather.air_quality);
        assert_eq!(parsed.weather.air_quality_cache_ttl_secs, 600);
    }

    #[tokio::test]
    async fn weather_section_can_disable_air_quality() {
        let raw = r#"
[weather]
air_quality = false
air_quality_cache_ttl_secs = 120
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert!(!parsed.weather.air_quality);
        assert_eq!(parsed.weather.air_quality_cache_ttl_secs, 120);
        assert_eq!(parsed.weather.cache_ttl_secs, 300);
    }

    #[test]
    async fn sessions_section_deserializes() {
        let raw = r#"
default_temperature = 0.2
[sessions]
ttl_secs = 600
cleanup_interval_secs = 0
max_context_messages = 6
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert_eq!(parsed.sessions.ttl_secs, 600);
        assert_eq!(parsed.sessions.cleanup_interval_secs, 0);
        assert_eq!(parsed.sessions.max_context_messages, 6);
        assert_eq!(parsed.sessions.max_context_chars, 16_000);
    }

    #[test]
    async fn validate_rejects_request_timeout_below_agent_timeout() {
        let mut config = Config::default();
        config.gateway.request_timeout_secs = 10;
        config.agent.timeout_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    async fn validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.sessions.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    async fn config_save_and_load_tmpdir() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.config_path = dir.path().join("config.toml");
        config.api_key = Some("sk-roundtrip".into());
        config.sessions.ttl_secs = 900;
        config.save().await.unwrap();

        let loaded = Config::load_or_init_in(dir.path()).await.unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("sk-roundtrip"));
        assert_eq!(loaded.sessions.ttl_secs, 900);
        assert_eq!(loaded.config_path, dir.path().join("config.toml"));
    }

    #[test]
    async fn load_or_init_writes_defaults_when_missing() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_or_init_in(dir.path()).await.unwrap();
        assert!(dir.path().join("config.toml").exists());
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    async fn load_rejects_malformed_file() {
        let _env_guard = env_override_lock().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "default_temperature = [").unwrap();
        assert!(Config::load_or_init_in(dir.path()).await.is_err());
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "SKYCAST_API_KEY",
            "API_KEY",
            "GOOGLE_API_KEY",
            "SKYCAST_PROVIDER_URL",
            "SKYCAST_MODEL",
            "MODEL",
            "SKYCAST_TEMPERATURE",
            "SKYCAST_WEATHER_API_KEY",
            "OPENWEATHER_API_KEY",
            "SKYCAST_GATEWAY_PORT",
            "PORT",
            "SKYCAST_GATEWAY_HOST",
            "HOST",
            "SKYCAST_ALLOW_PUBLIC_BIND",
            "SKYCAST_SESSION_TTL_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[test]
    async fn env_override_api_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("SKYCAST_API_KEY", "sk-test-env-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("sk-test-env-key"));

        std::env::remove_var("SKYCAST_API_KEY");
    }

    #[test]
    async fn env_override_api_key_falls_back_to_google_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("GOOGLE_API_KEY", "g-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("g-key"));

        std::env::remove_var("GOOGLE_API_KEY");
    }

    #[test]
    async fn env_override_weather_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("OPENWEATHER_API_KEY", "ow-key");
        config.apply_env_overrides();
        assert_eq!(config.weather.api_key.as_deref(), Some("ow-key"));

        std::env::remove_var("OPENWEATHER_API_KEY");
    }

    #[test]
    async fn env_override_port_and_invalid_temperature() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("PORT", "9090");
        std::env::set_var("SKYCAST_TEMPERATURE", "7.5");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 9090);
        assert!((config.default_temperature - 0.1).abs() < f64::EPSILON);

        std::env::remove_var("PORT");
        std::env::remove_var("SKYCAST_TEMPERATURE");
    }

    #[test]
    async fn env_override_session_ttl_ignores_zero() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("SKYCAST_SESSION_TTL_SECS", "0");
        config.apply_env_overrides();
        assert_eq!(config.sessions.ttl_secs, 86_400);

        std::env::set_var("SKYCAST_SESSION_TTL_SECS", "120");
        config.apply_env_overrides();
        assert_eq!(config.sessions.ttl_secs, 120);

        std::env::remove_var("SKYCAST_SESSION_TTL_SECS");
    }
}
