//! Custom error types for jurisprudencia

use thiserror::Error;

/// Main error type for jurisprudencia operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage write failed for '{name}': {message}")]
    StorageWrite { name: String, message: String },

    #[error("All fetch strategies failed for {0}")]
    FetchExhausted(String),

    #[error("Malformed import: {0}")]
    ImportMalformed(String),

    #[error("An ingestion run is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a per-entry write failure with the entry it concerns
    pub fn write(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::StorageWrite {
            name: name.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for jurisprudencia
pub type Result<T> = std::result::Result<T, Error>;
