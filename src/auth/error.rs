use axum::response::{IntoResponse, Response};

use crate::problem::{ErrorCategory, NormalizedError};

/// Credential and permission failures raised by the authorization gate
///
/// Variants carry only what is safe to show a caller. Verification internals
/// are logged by the validator and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header on the request
    #[error("Missing authorization header")]
    MissingHeader,

    /// Header present but not of the form `Bearer <token>`
    #[error("Malformed authorization header")]
    MalformedHeader,

    /// Token could not be decoded, or lacks required parts
    #[error("Malformed token")]
    MalformedToken,

    /// Signature did not verify against any configured key
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token `exp` is in the past
    #[error("Token expired")]
    Expired,

    /// Token `iss` does not match the configured issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Token `aud` does not include the configured audience
    #[error("Invalid token audience")]
    InvalidAudience,

    /// Verification keys could not be loaded
    #[error("Signing keys unavailable")]
    KeysUnavailable,

    /// Valid token, but the required permission was not granted
    #[error("Insufficient scope. Required: {0}")]
    InsufficientScope(String),
}

impl AuthError {
    /// Classification table row for this failure
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::MissingHeader => ErrorCategory::MissingAuthHeader,
            AuthError::MalformedHeader => ErrorCategory::MalformedHeader,
            AuthError::MalformedToken => ErrorCategory::MalformedToken,
            AuthError::InvalidSignature => ErrorCategory::InvalidSignature,
            AuthError::Expired => ErrorCategory::ExpiredToken,
            AuthError::InvalidIssuer | AuthError::InvalidAudience => ErrorCategory::InvalidClaims,
            AuthError::KeysUnavailable => ErrorCategory::KeysUnavailable,
            AuthError::InsufficientScope(_) => ErrorCategory::InsufficientScope,
        }
    }

    /// Resolve into the caller-facing error shape
    pub fn to_normalized(&self) -> NormalizedError {
        let error = self.category().to_error();
        match self {
            AuthError::InsufficientScope(permission) => {
                error.with_description(format!("Permission '{permission}' is required."))
            }
            _ => error,
        }
    }
}

impl From<AuthError> for NormalizedError {
    fn from(err: AuthError) -> Self {
        err.to_normalized()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.to_normalized().into_response()
    }
}
