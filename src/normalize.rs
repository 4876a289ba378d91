//! Classification of handler failures
//!
//! Domain code reports failures as a [`DomainError`]. [`normalize`] decides
//! per variant whether the caller sees a [`NormalizedError`] or the failure
//! is re-raised to the host's top-level handler:
//!
//! | variant        | outcome                               |
//! |----------------|---------------------------------------|
//! | `Structured`   | returned unchanged                    |
//! | `NotFound`     | 404 from the classification table     |
//! | `Validation`   | 422 Unprocessable Entity              |
//! | `Integrity`    | 422 Unprocessable Entity              |
//! | `Unclassified` | logged in full, then re-raised        |
//!
//! Every failure implies the in-flight write is abandoned. The rollback itself
//! is run by [`crate::transaction::TransactionScope`].

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::problem::{ErrorCategory, NormalizedError};

/// Failures raised by domain handlers
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Deliberate, already-structured failure
    #[error(transparent)]
    Structured(#[from] NormalizedError),

    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Value or type validation failure in the request payload
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Uniqueness or referential-integrity violation from the storage layer
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Anything else
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        DomainError::NotFound {
            resource: resource.into(),
        }
    }
}

/// A failure that matched no known category
///
/// Never shown to the caller as a [`NormalizedError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct UnclassifiedError(#[from] pub anyhow::Error);

/// What the caller should see
#[derive(Debug)]
pub enum Outcome {
    Respond(NormalizedError),
    Reraise(UnclassifiedError),
}

/// Result of classifying a [`DomainError`]
#[derive(Debug)]
#[must_use]
pub struct Normalization {
    pub outcome: Outcome,
    /// Whether the in-flight write transaction must be rolled back
    pub rollback: bool,
}

/// Classify a handler failure
pub fn normalize(err: DomainError) -> Normalization {
    let outcome = match err {
        DomainError::Structured(error) => {
            tracing::debug!(code = error.code(), "structured failure: {}", error);
            Outcome::Respond(error)
        }
        DomainError::NotFound { resource } => {
            tracing::debug!(%resource, "resource not found");
            Outcome::Respond(ErrorCategory::NotFound.to_error())
        }
        DomainError::Validation(message) => {
            tracing::error!(%message, "request failed validation");
            Outcome::Respond(ErrorCategory::ValueError.to_error())
        }
        DomainError::Integrity(message) => {
            tracing::error!(%message, "storage integrity violation");
            Outcome::Respond(ErrorCategory::IntegrityViolation.to_error())
        }
        DomainError::Unclassified(error) => {
            tracing::error!(error = ?error, "unhandled failure: {:#}", error);
            Outcome::Reraise(UnclassifiedError(error))
        }
    };

    Normalization {
        outcome,
        rollback: true,
    }
}

/// Handler failure after classification
///
/// `?` on a [`DomainError`] inside a handler returning
/// `Result<_, HandlerFailure>` runs [`normalize`].
#[derive(Debug, thiserror::Error)]
pub enum HandlerFailure {
    #[error(transparent)]
    Normalized(NormalizedError),

    #[error(transparent)]
    Unhandled(UnclassifiedError),
}

impl From<DomainError> for HandlerFailure {
    fn from(err: DomainError) -> Self {
        match normalize(err).outcome {
            Outcome::Respond(error) => HandlerFailure::Normalized(error),
            Outcome::Reraise(error) => HandlerFailure::Unhandled(error),
        }
    }
}

impl From<NormalizedError> for HandlerFailure {
    fn from(err: NormalizedError) -> Self {
        HandlerFailure::Normalized(err)
    }
}

/// Unhandled failure carried in response extensions for the top-level handler
#[derive(Debug, Clone)]
pub struct UnhandledFailure(pub Arc<UnclassifiedError>);

impl IntoResponse for HandlerFailure {
    fn into_response(self) -> Response {
        match self {
            HandlerFailure::Normalized(error) => error.into_response(),
            HandlerFailure::Unhandled(error) => {
                // opaque to the caller; the host's fallback decides the body
                let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                response
                    .extensions_mut()
                    .insert(UnhandledFailure(Arc::new(error)));
                response
            }
        }
    }
}
