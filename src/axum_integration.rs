//! Axum integration for the authorization gate
//!
//! - `Authorized`: the extractor through which handlers receive verified claims
//! - `bearer_header`: read the raw `Authorization` value from a request
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use pawpost_gate::Authorized;
//!
//! async fn list_posts(claims: Authorized) -> String {
//!     format!("Posts for {}", claims.subject())
//! }
//!
//! let app = Router::new()
//!     .route("/posts/", get(list_posts.layer(gate.require("get:posts".parse()?))));
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::ops::Deref;

use crate::auth::{AuthError, Claims};
use crate::problem::NormalizedError;

/// Raw `Authorization` header value
///
/// `Ok(None)` when absent; a value that is not valid UTF-8 is reported as
/// [`AuthError::MalformedHeader`].
pub fn bearer_header(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader))
        .transpose()
}

/// Verified claims, handed to a handler as an explicit argument
///
/// Only [`crate::auth::RequirePermissionMiddleware`] inserts this, after the
/// credential verified and the route's permission was found among its grants.
#[derive(Debug, Clone)]
pub struct Authorized(pub Claims);

impl Deref for Authorized {
    type Target = Claims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Authorized {
    /// Get the inner Claims
    pub fn into_inner(self) -> Claims {
        self.0
    }
}

impl<S> FromRequestParts<S> for Authorized
where
    S: Send + Sync,
{
    type Rejection = NormalizedError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // absent means the route was registered without a permission layer
        parts.extensions.get::<Authorized>().cloned().ok_or_else(|| {
            tracing::error!(uri = %parts.uri, "Authorized extractor used on an unprotected route");
            AuthError::MissingHeader.to_normalized()
        })
    }
}
