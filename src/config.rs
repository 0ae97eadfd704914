//! Configuration management module.
//!
//! Configuration is loaded from layered sources:
//! - Global config file (~/.config/openchat/openchat.json)
//! - Project config file (./openchat.json or ./openchat.jsonc)
//! - Environment variables
//!
//! Project config overrides global config; environment variables override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// JSON schema reference
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Default model in provider/model format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Disabled providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_providers: Option<Vec<String>>,

    /// Enabled providers (if set, only these are enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_providers: Option<Vec<String>>,

    /// Per-provider settings keyed by provider id
    pub provider: HashMap<String, ProviderSettings>,

    /// Server settings
    pub server: ServerConfig,

    /// Timeout settings
    pub timeouts: TimeoutConfig,

    /// Storage settings
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key; usually left to the provider's environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the vendor endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    /// Allowed CORS origins; empty means allow any
    pub cors: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 19876,
            hostname: "127.0.0.1".to_string(),
            cors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream request timeout in milliseconds
    pub request_ms: u64,
    /// Ceiling on a whole streamed completion in milliseconds
    pub completion_ceiling_ms: u64,
    /// SSE heartbeat interval in milliseconds
    pub heartbeat_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            completion_ceiling_ms: 60_000,
            heartbeat_ms: 15_000,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn completion_ceiling(&self) -> Duration {
        Duration::from_millis(self.completion_ceiling_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    /// Override for the conversation storage directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,

    /// Soft cap on stored bytes; writes that would exceed it fail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<u64>,
}

impl Config {
    /// Load configuration from all sources
    pub async fn load() -> Result<Self> {
        let mut config = Config::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_file(&global_path).await? {
                config = config.merge(global_config);
            }
        }

        // Load project config
        if let Some(project_path) = Self::find_project_config().await? {
            if let Some(project_config) = Self::load_file(&project_path).await? {
                config = config.merge(project_config);
            }
        }

        // Apply environment variable overrides
        config = config.apply_env_overrides();

        Ok(config)
    }

    /// Get the global config directory path
    pub fn global_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("openchat"))
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|p| p.join("openchat.json"))
    }

    /// Find project config file in current directory or parent directories
    async fn find_project_config() -> Result<Option<PathBuf>> {
        let mut current = std::env::current_dir()?;

        loop {
            // Check for openchat.jsonc first, then openchat.json
            for filename in &["openchat.jsonc", "openchat.json"] {
                let config_path = current.join(filename);
                if config_path.exists() {
                    return Ok(Some(config_path));
                }
            }

            // Move to parent directory
            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Load configuration from a file
    async fn load_file(path: &Path) -> Result<Option<Config>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Handle empty or whitespace-only files
        if content.trim().is_empty() {
            return Ok(Some(Config::default()));
        }

        // Handle JSONC (JSON with comments)
        let content = Self::strip_jsonc_comments(&content);

        // Strip trailing commas
        let content = Self::strip_trailing_commas(&content);

        // Handle environment variable substitution
        let content = Self::substitute_env_vars(&content);

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(Some(config))
    }

    /// Strip comments from JSONC content
    fn strip_jsonc_comments(content: &str) -> String {
        let mut result = String::new();
        let mut in_string = false;
        let mut in_line_comment = false;
        let mut in_block_comment = false;
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if in_line_comment {
                if c == '\n' {
                    in_line_comment = false;
                    result.push(c);
                }
                continue;
            }

            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                }
                continue;
            }

            if c == '"' && !in_string {
                in_string = true;
                result.push(c);
                continue;
            }

            if c == '"' && in_string {
                // Check for escape
                let mut backslash_count = 0;
                for ch in result.chars().rev() {
                    if ch == '\\' {
                        backslash_count += 1;
                    } else {
                        break;
                    }
                }
                if backslash_count % 2 == 0 {
                    in_string = false;
                }
                result.push(c);
                continue;
            }

            if !in_string {
                if c == '/' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_line_comment = true;
                    continue;
                }

                if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    in_block_comment = true;
                    continue;
                }
            }

            result.push(c);
        }

        result
    }

    /// Strip trailing commas from JSON (common in JSONC)
    fn strip_trailing_commas(content: &str) -> String {
        // Remove trailing commas before closing braces or brackets
        let re = regex::Regex::new(r",(\s*[}\]])").unwrap();
        re.replace_all(content, "$1").to_string()
    }

    /// Substitute environment variables in the format {env:VAR_NAME}
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\{env:([^}]+)\}").unwrap();
        re.replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(mut self, other: Config) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.disabled_providers.is_some() {
            self.disabled_providers = other.disabled_providers;
        }
        if other.enabled_providers.is_some() {
            self.enabled_providers = other.enabled_providers;
        }

        self.provider.extend(other.provider);
        self.server = other.server;
        self.timeouts = other.timeouts;
        if other.storage.base_path.is_some() {
            self.storage.base_path = other.storage.base_path;
        }
        if other.storage.quota_bytes.is_some() {
            self.storage.quota_bytes = other.storage.quota_bytes;
        }

        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("OPENCHAT_MODEL") {
            self.model = Some(model);
        }
        if let Ok(log_level) = std::env::var("OPENCHAT_LOG_LEVEL") {
            self.log_level = Some(log_level);
        }
        if let Ok(port) = std::env::var("OPENCHAT_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        self
    }

    /// Create a default config file if it doesn't exist
    pub async fn init() -> Result<PathBuf> {
        let config_dir = Self::global_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        fs::create_dir_all(&config_dir)
            .await
            .context("Failed to create config directory")?;

        let config_path = config_dir.join("openchat.json");

        if !config_path.exists() {
            let default_config = Config {
                schema: Some("https://openchat.dev/schema/config.json".to_string()),
                log_level: Some("info".to_string()),
                ..Default::default()
            };

            let content = serde_json::to_string_pretty(&default_config)?;
            fs::write(&config_path, content)
                .await
                .context("Failed to write default config file")?;
        }

        Ok(config_path)
    }
}
