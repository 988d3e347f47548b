//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("{0} must be an absolute http(s) URL")]
    InvalidUrl(&'static str),

    #[error("Payment provider URL must use HTTPS in production")]
    ProviderUrlMustBeHttps,

    #[error("Provider retry count exceeds maximum allowed (10)")]
    TooManyRetries,

    #[error("Sweeper interval must be positive")]
    InvalidSweepInterval,

    #[error("Timeout threshold must be positive")]
    InvalidTimeoutThreshold,

    #[error("Sweeper batch size must be between 1 and 1000")]
    InvalidBatchSize,

    #[error("Admin token must be at least 16 characters in production")]
    WeakAdminToken,
}
