use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use serde_json::Value;

/// Verified identity and permission data from a bearer token
///
/// There is no public constructor: the only way to obtain `Claims` is through
/// [`crate::auth::CredentialValidator`], after signature and expiry checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    subject: String,
    permissions: BTreeSet<String>,
    expires_at: i64,
    issuer: Option<String>,
    audience: Vec<String>,
    extra: HashMap<String, Value>,
}

impl Claims {
    /// Subject (user ID)
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Granted permissions, sorted
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Check whether `permission` was granted, by exact match
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Expiry, in seconds since the epoch
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Any claim not modelled above, e.g. `email` or provider-specific fields
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// `aud` is either a single string or an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Audience {
    One(String),
    Many(Vec<String>),
}

/// Wire shape of the token payload; only deserialized after verification
#[derive(Debug, Deserialize)]
pub(crate) struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    /// RBAC permissions array, as issued by Auth0
    #[serde(default)]
    pub permissions: Vec<String>,
    /// OAuth 2 space-separated scope string
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl From<TokenClaims> for Claims {
    fn from(raw: TokenClaims) -> Self {
        let mut permissions: BTreeSet<String> = raw
            .permissions
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
        if let Some(scope) = raw.scope {
            permissions.extend(scope.split_whitespace().map(str::to_string));
        }

        let audience = match raw.aud {
            Some(Audience::One(aud)) => vec![aud],
            Some(Audience::Many(aud)) => aud,
            None => Vec::new(),
        };

        Self {
            subject: raw.sub,
            permissions,
            expires_at: raw.exp,
            issuer: raw.iss,
            audience,
            extra: raw.extra,
        }
    }
}

#[cfg(test)]
pub(crate) fn claims_with_permissions(permissions: &[&str]) -> Claims {
    Claims::from(TokenClaims {
        sub: "auth0|user123".to_string(),
        exp: 9999999999,
        iss: None,
        aud: None,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        scope: None,
        extra: HashMap::new(),
    })
}
