//! Error types for gate setup and key management

/// Crate-level error type
///
/// These are setup and infrastructure failures. Request-time credential
/// failures use [`crate::auth::AuthError`] and handler failures use
/// [`crate::normalize::DomainError`].
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid error status: {0} is not a 4xx/5xx code")]
    InvalidStatus(u16),

    #[error("Signing key error: {0}")]
    SigningKey(String),

    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
