use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid hardware identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}

impl DomainError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::StorageUnavailable(_))
    }
}
