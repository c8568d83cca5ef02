use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for account operations.
///
/// The HTTP mapping lives in `api::error`; expired tokens and unknown role
/// references deliberately surface as server errors rather than client
/// errors, matching the behavior the API has always had.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input, including duplicate registration.
    #[error("{0}")]
    Validation(String),

    /// Uniform authentication failure, regardless of cause.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Missing or invalid session credential.
    #[error("invalid or missing session credential")]
    Unauthorized,

    /// Unknown user, token, or role id.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Lifecycle token past its expiry timestamp.
    #[error("token expired")]
    Expired,

    /// Role id that does not resolve during assignment.
    #[error("unknown role: {0}")]
    UnknownReference(Uuid),

    /// Deletion rejected because other records still reference the target.
    #[error("{0} is still referenced and cannot be deleted")]
    Protected(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}
