//! Configuration management for cinesearch
//!
//! Loads the TOML configuration, applies profile and environment overrides and
//! validates the result before anything else touches it.

use crate::error::{CineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub engine: EngineConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Which search engine flavour the HTTP adapter speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Elasticsearch,
    Opensearch,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Elasticsearch => "elasticsearch",
            EngineKind::Opensearch => "opensearch",
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elasticsearch" | "elastic" => Ok(EngineKind::Elasticsearch),
            "opensearch" => Ok(EngineKind::Opensearch),
            other => Err(format!("unknown engine kind '{}'", other)),
        }
    }
}

/// Search engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub url: String,
    pub username: String,
    /// Name of the environment variable holding the password
    pub password_env: String,
    pub index: String,
    pub model_id: String,
    pub ingest_pipeline: String,
    pub accept_invalid_certs: bool,
    pub max_retries: u32,
    pub request_timeout: String,
    pub semantic_timeout: String,
}

impl EngineConfig {
    pub fn password(&self) -> Option<String> {
        std::env::var(&self.password_env)
            .ok()
            .filter(|p| !p.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(30))
    }

    pub fn semantic_timeout(&self) -> Duration {
        parse_duration(&self.semantic_timeout).unwrap_or(Duration::from_secs(60))
    }
}

/// Ranking, paging and caching knobs for the search core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Deepest hit (`from + size`) a page may reach
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,
    pub rank_constant: u32,
    pub rank_window_size: usize,
    pub facet_size: usize,
    pub genre_list_size: usize,
    pub availability_ttl: String,
    pub similar_default_limit: usize,
    pub similar_max_limit: usize,
}

fn default_max_result_window() -> usize {
    10_000
}

impl SearchConfig {
    pub fn availability_ttl(&self) -> Duration {
        parse_duration(&self.availability_ttl).unwrap_or(Duration::from_secs(60))
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

/// Settings for the interactive client session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub debounce: String,
    pub page_size: usize,
}

impl ClientConfig {
    pub fn debounce(&self) -> Duration {
        parse_duration(&self.debounce).unwrap_or(Duration::from_millis(300))
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_kind: Option<EngineKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_bind: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CineError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CineError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CineError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| CineError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(kind) = overrides.engine_kind {
            self.engine.kind = kind;
        }
        if let Some(url) = overrides.engine_url {
            self.engine.url = url;
        }
        if let Some(index) = overrides.engine_index {
            self.engine.index = index;
        }
        if let Some(model_id) = overrides.model_id {
            self.engine.model_id = model_id;
        }
        if let Some(bind) = overrides.server_bind {
            self.server.bind = bind;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CINESEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("CINESEARCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "ENGINE__KIND" => {
                self.engine.kind = value
                    .parse()
                    .map_err(|message| CineError::InvalidConfigValue {
                        path: path.to_string(),
                        message,
                    })?;
            }
            "ENGINE__URL" => {
                self.engine.url = value.to_string();
            }
            "ENGINE__INDEX" => {
                self.engine.index = value.to_string();
            }
            "ENGINE__MODEL_ID" => {
                self.engine.model_id = value.to_string();
            }
            "SERVER__BIND" => {
                self.server.bind = value.to_string();
            }
            "CLIENT__BASE_URL" => {
                self.client.base_url = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CineError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("cinesearch").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "opensearch".to_string(),
            ProfileOverrides {
                engine_kind: Some(EngineKind::Opensearch),
                ..ProfileOverrides::default()
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            engine: EngineConfig {
                kind: EngineKind::Elasticsearch,
                url: "http://localhost:9200".to_string(),
                username: "elastic".to_string(),
                password_env: "ELASTICSEARCH_PASSWORD".to_string(),
                index: "movies".to_string(),
                model_id: ".elser_model_2".to_string(),
                ingest_pipeline: "elser-ingest".to_string(),
                accept_invalid_certs: true,
                max_retries: 2,
                request_timeout: "30s".to_string(),
                semantic_timeout: "60s".to_string(),
            },
            search: SearchConfig {
                default_page_size: 24,
                max_page_size: 50,
                max_result_window: default_max_result_window(),
                rank_constant: 60,
                rank_window_size: 100,
                facet_size: 30,
                genre_list_size: 50,
                availability_ttl: "60s".to_string(),
                similar_default_limit: 8,
                similar_max_limit: 20,
            },
            server: ServerConfig {
                bind: "127.0.0.1:3000".to_string(),
            },
            client: ClientConfig {
                base_url: "http://127.0.0.1:3000".to_string(),
                debounce: "300ms".to_string(),
                page_size: 24,
            },
            profiles,
        }
    }
}

/// Parse a duration string such as "300ms", "30s", "2m" or "1h".
/// A bare number is read as seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();

    // Check "ms" before "s" because "ms" ends with "s"
    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = value.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .map(|h| Duration::from_secs(h * 3600))
    } else {
        value.parse().ok().map(Duration::from_secs)
    }
}
