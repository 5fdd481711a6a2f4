use sea_orm::error::DbErr;
use thiserror::Error;

use crate::config::AppConfigError;

/// Errors surfaced by the command line tool.
///
/// Migration steps themselves return the driver's `DbErr` unchanged; this type
/// only wraps it at the binary boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] AppConfigError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::ConfigError(_) | AppError::InvalidArgument(_) => 2,
            AppError::DatabaseError(_) | AppError::SerializationError(_) => 1,
        }
    }
}
