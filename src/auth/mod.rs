//! Bearer-token authorization for axum routes
//!
//! This module validates bearer credentials and enforces one permission per
//! protected operation.
//!
//! # Features
//!
//! - `CredentialValidator`: header parsing, signature, expiry, issuer and audience checks
//! - `check_permission`: exact-match permission check against verified `Claims`
//! - `AuthorizationGate`: both of the above, in order, with denials normalized
//! - `RequirePermission`: tower middleware layer applying the gate per route
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::{get, post}, Router};
//! use pawpost_gate::auth::{AuthorizationGate, CredentialValidator};
//!
//! let gate = AuthorizationGate::new(CredentialValidator::from_config(config.auth_config()?)?);
//!
//! let app = Router::new().route(
//!     "/posts/",
//!     get(list_posts.layer(gate.require("get:posts".parse()?)))
//!         .post(create_post.layer(gate.require("post:post".parse()?))),
//! );
//! ```

pub mod claims;
pub mod error;
pub mod gate;
#[cfg(feature = "remote-jwks")]
pub mod jwks;
pub mod middleware;
pub mod permission;
pub mod validator;

pub use claims::Claims;
pub use error::AuthError;
pub use gate::AuthorizationGate;
#[cfg(feature = "remote-jwks")]
pub use jwks::JwksKeySource;
pub use middleware::{RequirePermission, RequirePermissionMiddleware};
pub use permission::{check_permission, Permission};
pub use validator::{parse_bearer, CredentialValidator, KeySource, ValidationOptions};
