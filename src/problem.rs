//! The uniform `{code, title, description}` failure shape and its
//! classification table.
//!
//! Every client-facing failure the gate or the normalizer resolves ends up as
//! a [`NormalizedError`]. Its `code` doubles as the HTTP status of the
//! response, so it is restricted to the 4xx/5xx range at construction.

use std::borrow::Cow;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

use crate::error::{GateError, Result};

/// Structured failure returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code} {title}: {description}")]
pub struct NormalizedError {
    code: u16,
    title: Cow<'static, str>,
    description: Cow<'static, str>,
}

impl NormalizedError {
    /// Build an error from an explicit status, title and description.
    ///
    /// Fails with [`GateError::InvalidStatus`] unless `status` is a client or
    /// server error.
    pub fn new(
        status: StatusCode,
        title: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Result<Self> {
        if !(status.is_client_error() || status.is_server_error()) {
            return Err(GateError::InvalidStatus(status.as_u16()));
        }
        Ok(Self {
            code: status.as_u16(),
            title: title.into(),
            description: description.into(),
        })
    }

    /// Same as [`NormalizedError::new`] with the canonical reason phrase as title
    pub fn from_status(
        status: StatusCode,
        description: impl Into<Cow<'static, str>>,
    ) -> Result<Self> {
        let title = status.canonical_reason().unwrap_or("Error");
        Self::new(status, title, description)
    }

    /// Replace the description, keeping code and title
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The code as a status; always a 4xx/5xx value
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for NormalizedError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Failure categories known to the classification table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    MissingAuthHeader,
    MalformedHeader,
    MalformedToken,
    InvalidSignature,
    ExpiredToken,
    InvalidClaims,
    InsufficientScope,
    KeysUnavailable,
    NotFound,
    ValueError,
    IntegrityViolation,
}

/// One row of the classification table
#[derive(Debug, Clone, Copy)]
pub struct ErrorTemplate {
    pub category: ErrorCategory,
    pub status: StatusCode,
    pub title: &'static str,
    pub description: &'static str,
}

/// Process-wide classification table, read-only
pub static CATALOG: [ErrorTemplate; 11] = [
    ErrorTemplate {
        category: ErrorCategory::MissingAuthHeader,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Authorization header is expected.",
    },
    ErrorTemplate {
        category: ErrorCategory::MalformedHeader,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Authorization header must be a bearer token.",
    },
    ErrorTemplate {
        category: ErrorCategory::MalformedToken,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Unable to parse authentication token.",
    },
    ErrorTemplate {
        category: ErrorCategory::InvalidSignature,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Token signature could not be verified.",
    },
    ErrorTemplate {
        category: ErrorCategory::ExpiredToken,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Token expired.",
    },
    ErrorTemplate {
        category: ErrorCategory::InvalidClaims,
        status: StatusCode::UNAUTHORIZED,
        title: "Unauthorized",
        description: "Incorrect claims. Please check the audience and issuer.",
    },
    ErrorTemplate {
        category: ErrorCategory::InsufficientScope,
        status: StatusCode::FORBIDDEN,
        title: "Forbidden",
        description: "Permission not found.",
    },
    ErrorTemplate {
        category: ErrorCategory::KeysUnavailable,
        status: StatusCode::SERVICE_UNAVAILABLE,
        title: "Service Unavailable",
        description: "Signing keys are temporarily unavailable.",
    },
    ErrorTemplate {
        category: ErrorCategory::NotFound,
        status: StatusCode::NOT_FOUND,
        title: "Not Found",
        description: "The requested resource could not be found.",
    },
    ErrorTemplate {
        category: ErrorCategory::ValueError,
        status: StatusCode::UNPROCESSABLE_ENTITY,
        title: "Unprocessable Entity",
        description: "The request was well-formed but contained invalid values.",
    },
    ErrorTemplate {
        category: ErrorCategory::IntegrityViolation,
        status: StatusCode::UNPROCESSABLE_ENTITY,
        title: "Unprocessable Entity",
        description: "The request conflicts with existing data.",
    },
];

impl ErrorCategory {
    /// Look up this category's row in [`CATALOG`]
    pub fn template(self) -> &'static ErrorTemplate {
        // every variant has a row; see catalog_covers_every_category
        CATALOG
            .iter()
            .find(|t| t.category == self)
            .unwrap_or(&CATALOG[0])
    }

    /// Instantiate the template as a [`NormalizedError`]
    pub fn to_error(self) -> NormalizedError {
        let template = self.template();
        NormalizedError {
            code: template.status.as_u16(),
            title: Cow::Borrowed(template.title),
            description: Cow::Borrowed(template.description),
        }
    }
}

impl From<ErrorCategory> for NormalizedError {
    fn from(category: ErrorCategory) -> Self {
        category.to_error()
    }
}
