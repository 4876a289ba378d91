use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::claims::Claims;
use super::error::AuthError;
use crate::error::{GateError, Result};

/// A permission requirement attached to an endpoint, e.g. `get:posts`
///
/// Built once at route registration and immutable afterwards. An empty
/// requirement is rejected here, so it can never surface as a runtime
/// authorization failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission(Arc<str>);

impl Permission {
    pub fn new(permission: impl AsRef<str>) -> Result<Self> {
        let permission = permission.as_ref();
        if permission.is_empty() {
            return Err(GateError::Config(
                "permission requirement must not be empty".to_string(),
            ));
        }
        if permission.chars().any(char::is_whitespace) {
            return Err(GateError::Config(format!(
                "permission requirement '{permission}' must not contain whitespace"
            )));
        }
        Ok(Self(Arc::from(permission)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Permission {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirm `required` is among the permissions granted to `claims`
pub fn check_permission(
    claims: &Claims,
    required: &Permission,
) -> std::result::Result<(), AuthError> {
    if claims.has_permission(required.as_str()) {
        Ok(())
    } else {
        Err(AuthError::InsufficientScope(required.to_string()))
    }
}
