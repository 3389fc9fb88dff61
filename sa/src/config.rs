//! SecAssist configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding `assistant.context-window-size`
pub const CONTEXT_WINDOW_ENV: &str = "ASSISTANT_CONTEXT_WINDOW_SIZE";

/// Environment variable overriding `analytics.load-schema` (`True` enables)
pub const LOAD_SCHEMA_ENV: &str = "SENTINELKQL_LOADSCHEMA";

/// Main SecAssist configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Orchestration settings
    pub assistant: AssistantConfig,

    /// Analytics query plugin and backend
    pub analytics: AnalyticsConfig,

    /// Document fetch plugin
    pub fetch: FetchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the LLM API key environment variable is set.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read only the log level (used before logging is initialized)
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .secassist.yml
        let local_config = PathBuf::from(".secassist.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/secassist/secassist.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("secassist").join("secassist.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply the legacy environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(CONTEXT_WINDOW_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(size) => {
                    debug!(size, "apply_env_overrides: context window from environment");
                    self.assistant.context_window_size = size;
                }
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric {}={}", CONTEXT_WINDOW_ENV, raw);
                }
            }
        }

        if let Ok(raw) = std::env::var(LOAD_SCHEMA_ENV) {
            self.analytics.load_schema = raw == "True";
            debug!(load_schema = self.analytics.load_schema, "apply_env_overrides: load-schema from environment");
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "azure")
    pub provider: String,

    /// Model identifier (deployment name for azure)
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// API version query parameter (azure only)
    #[serde(rename = "api-version")]
    pub api_version: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling
    #[serde(rename = "top-p")]
    pub top_p: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "azure".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "AZURE_OPENAI_APIKEY".to_string(),
            base_url: "https://example.openai.azure.com".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            top_p: 0.95,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Number of user/assistant pairs kept in the session context
    #[serde(rename = "context-window-size")]
    pub context_window_size: usize,

    /// Console width used by the terminal formatter (detected when unset)
    #[serde(rename = "console-width")]
    pub console_width: Option<u16>,

    /// Directory with `{name}.pmt` prompt overrides
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            context_window_size: 5,
            console_width: None,
            prompts_dir: None,
        }
    }
}

/// Analytics query plugin and backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Register the analytics plugin at all
    pub enabled: bool,

    /// Build or load the per-table schema catalog at startup
    #[serde(rename = "load-schema")]
    pub load_schema: bool,

    /// JSON file used to cache the schema catalog between runs
    #[serde(rename = "schema-cache")]
    pub schema_cache: Option<PathBuf>,

    /// Query API endpoint
    pub endpoint: String,

    /// Log analytics workspace id
    #[serde(rename = "workspace-id")]
    pub workspace_id: String,

    /// Environment variable holding the bearer token for the query API
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Look-back window for sample rows
    #[serde(rename = "sample-days")]
    pub sample_days: u32,

    /// Sample rows per table fed to schema summarization
    #[serde(rename = "sample-rows")]
    pub sample_rows: u32,

    /// Field cap for summarized tables
    #[serde(rename = "max-fields")]
    pub max_fields: u32,

    /// Tables summarized with every field
    #[serde(rename = "full-schema-tables")]
    pub full_schema_tables: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            load_schema: true,
            schema_cache: dirs::data_dir().map(|d| d.join("secassist").join("schema.json")),
            endpoint: "https://api.loganalytics.io".to_string(),
            workspace_id: String::new(),
            token_env: "LOG_ANALYTICS_TOKEN".to_string(),
            sample_days: 30,
            sample_rows: 3,
            max_fields: 12,
            full_schema_tables: vec!["SecurityAlert".to_string(), "SecurityIncident".to_string()],
        }
    }
}

/// Document fetch plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Maximum response body size
    #[serde(rename = "max-bytes")]
    pub max_bytes: usize,

    /// User agent sent with fetch requests
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_bytes: 1_000_000,
            user_agent: "SecAssist/0.1 (fetch plugin)".to_string(),
        }
    }
}
