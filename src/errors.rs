use thiserror::Error;

/// Errors raised by pgswap operations.
///
/// The first six variants are domain errors: the CLI renders them as a single
/// line without diagnostics. Everything else is treated as an internal failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    OperationDisabled(String),

    #[error("{0}")]
    ExternalTool(String),

    #[error("{0}")]
    Routing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("AWS SDK S3 error: {0}")]
    S3Sdk(String),
}

impl AppError {
    /// True for errors that carry a user-facing message of their own.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            AppError::Configuration(_)
                | AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::OperationDisabled(_)
                | AppError::ExternalTool(_)
                | AppError::Routing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
