use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("not a member of this conversation")]
    NotAMember,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation not valid for a dialog conversation")]
    InvalidMode,
}

impl AppError {
    /// Only optimistic-write conflicts are worth retrying; everything else
    /// is terminal for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// HTTP status code the service layer should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Forbidden | AppError::InvalidMode => 403,
            AppError::NotFound | AppError::NotAMember => 404,
            AppError::Conflict(_) => 409,
            AppError::Config(_) => 500,
        }
    }
}
