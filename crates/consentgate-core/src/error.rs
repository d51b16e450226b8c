//! Error types for Consentgate
//!
//! Consent parsing never produces these: malformed stored consent degrades to
//! the default-denied record. They cover the edges around the state machine
//! (config files, CLI input).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid mode: {kind} - {value}")]
    InvalidMode { kind: String, value: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_mode(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidMode {
            kind: kind.into(),
            value: value.into(),
        }
    }
}
