use axum::http::StatusCode;

use super::domain::PropertyStatus;
use super::identity::IdentityError;
use super::media::MediaError;
use super::store::StoreError;

/// Typed failure returned by every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("property not found")]
    NotFound,
    #[error("cannot {action} a {status} property")]
    InvalidTransition {
        action: &'static str,
        status: PropertyStatus,
    },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl LifecycleError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }

    /// Only infrastructure failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifecycleError::StoreUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
            LifecycleError::NotFound => StatusCode::NOT_FOUND,
            LifecycleError::InvalidTransition { .. } | LifecycleError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            LifecycleError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LifecycleError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => LifecycleError::NotFound,
            StoreError::Conflict => LifecycleError::Conflict("record already exists".to_string()),
            StoreError::Unavailable(reason) => LifecycleError::StoreUnavailable(reason),
        }
    }
}

impl From<MediaError> for LifecycleError {
    fn from(value: MediaError) -> Self {
        match value {
            MediaError::Rejected(reason) => LifecycleError::ValidationFailed(reason),
            MediaError::Transient(reason) => LifecycleError::StoreUnavailable(reason),
        }
    }
}

impl From<IdentityError> for LifecycleError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::Invalid | IdentityError::Revoked => LifecycleError::Unauthenticated,
            IdentityError::Unavailable(reason) => LifecycleError::StoreUnavailable(reason),
        }
    }
}
