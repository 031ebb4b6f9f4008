use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

/// Stable message surfaced when every search strategy has failed
pub const SEARCH_UNAVAILABLE: &str = "search backend unavailable";

/// Main error type for cinesearch
#[derive(Error, Debug)]
pub enum CineError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Search engine errors that were not absorbed by a fallback
    #[error("Search engine error: {0}")]
    Engine(#[from] EngineError),

    /// Every search strategy failed, including the lexical fallback
    #[error("{0}")]
    SearchUnavailable(String),

    /// Movie lookup miss
    #[error("Movie not found: {id}")]
    NotFound { id: String },

    /// Client search session errors
    #[error("Session error: {0}")]
    Session(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),
}

impl CineError {
    /// The error every caller sees when the engine cannot be reached at all
    pub fn search_unavailable() -> Self {
        Self::SearchUnavailable(SEARCH_UNAVAILABLE.to_string())
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for cinesearch operations
pub type Result<T> = std::result::Result<T, CineError>;
