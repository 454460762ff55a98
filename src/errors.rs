use thiserror::Error;

/// Errors surfaced by the service layer.
///
/// External lookup failures are deliberately absent: the lookup client
/// degrades to an empty result set and the condition only escalates as
/// [`AppError::NoEligibleFood`] when no usable candidate remains.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no eligible foods after filtering; adjust allergies or preferences")]
    NoEligibleFood,

    #[error("portion size must be greater than zero, got {0}")]
    InvalidPortionSize(f64),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}
