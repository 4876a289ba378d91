//! # pawpost-gate
//!
//! Authorization and error normalization for the pawpost pets/posts API.
//!
//! Sits between the HTTP layer and domain handlers:
//!
//! - [`auth`]: validates `Authorization: Bearer <token>` and requires one
//!   permission per protected route, short-circuiting with a structured denial
//! - [`normalize`]: classifies handler failures into `{code, title, description}`
//!   or re-raises the ones it does not recognise
//! - [`transaction`]: rolls back the storage session on every failed exit path
//!
//! ## Features
//!
//! - `remote-jwks` (default): verify tokens against keys published at a JWKS URL

pub mod error;
pub use error::{GateError, Result};

pub mod auth;
pub mod axum_integration;
pub mod config;
pub mod normalize;
pub mod problem;
pub mod transaction;

#[cfg(test)]
mod testutil;

pub use crate::auth::{AuthError, AuthorizationGate, Claims, CredentialValidator, Permission};
pub use crate::axum_integration::Authorized;
pub use crate::config::{GateConfig, PermissionTable};
pub use crate::normalize::{normalize, DomainError, HandlerFailure};
pub use crate::problem::{ErrorCategory, NormalizedError};
pub use crate::transaction::{run_in_transaction, StorageSession, TransactionScope};
