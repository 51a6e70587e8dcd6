use std::path::PathBuf;

/// Error raised by a `StatsSource` call.
///
/// The source only reports what happened (an optional machine code, an
/// optional HTTP-like status, a message). Whether the failure is worth
/// retrying is decided by the gateway's `RetryPolicy`, so the same error can
/// be transient under one configuration and permanent under another.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::with_code("ETIMEDOUT", "request timed out")
    }
}

/// Startup configuration failure. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
