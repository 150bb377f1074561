use thiserror::Error;

/// Crate-wide error type.
///
/// Internal boundary only: per the propagation policy, the identity
/// resolver, AniList client, and cache layer never surface this type to
/// their callers — they degrade to `None`/`false`/empty collections instead.
/// `AppError` is used by the flow controller, the plugin registry, the
/// history store, and anywhere a failure needs to be logged with context
/// before being swallowed or (for fatal configuration only) propagated to
/// `main`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plugin '{0}' failed: {1}")]
    Plugin(String, String),

    #[error("player error: {0}")]
    Player(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Cache(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
