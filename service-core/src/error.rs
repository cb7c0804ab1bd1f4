use thiserror::Error;

/// Infrastructure failures: the store, the process or its configuration.
///
/// Domain rejections live in each service's own error enum, which wraps
/// this one. Payloads are logged, never sent to callers; gRPC callers see
/// `kind()` and `public_message()` only.
#[derive(Debug, Error)]
pub enum AppError {
    /// A write hit a uniqueness constraint.
    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-readable kind, shared by HTTP bodies and gRPC metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::DatabaseError(_) => "store_error",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal",
        }
    }

    /// The message callers see.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "Conflicting write",
            Self::DatabaseError(_) => "Database error",
            Self::ConfigError(_) => "Configuration error",
            Self::InternalError(_) => "Internal server error",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}
