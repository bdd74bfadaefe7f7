//! Application error types and handling

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Object does not exist")]
    ObjectNotExist,

    #[error("Object already exists: {0}")]
    ObjectExists(String),

    #[error("Unsupported storage policy: {0}")]
    UnsupportedPolicy(String),

    #[error("IO failed: {0}")]
    IoFailed(String),

    #[error("Invalid upload context: {0}")]
    ContextInvalid(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable identifier for callers that serialize errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ObjectNotExist => "object_not_exist",
            AppError::ObjectExists(_) => "object_exists",
            AppError::UnsupportedPolicy(_) => "unsupported_policy",
            AppError::IoFailed(_) | AppError::Io(_) => "io_failed",
            AppError::ContextInvalid(_) => "context_invalid",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::ObjectExists(db_err.message().to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
