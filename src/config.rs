//! Configuration parsing module for the gate
//!
//! Loads signing-key material, issuer/audience constraints and the
//! permission-to-endpoint table from a TOML file.
//!
//! # Example
//!
//! ```rust,ignore
//! use pawpost_gate::config::load_config;
//!
//! let config = load_config("gate.toml")?;
//! let validator = CredentialValidator::from_config(config.auth_config()?)?;
//! let permissions = PermissionTable::from_config(&config)?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialValidator, Permission, ValidationOptions};
use crate::error::{GateError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Credential validation section
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Route (`"METHOD /path"`) to required permission
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
}

impl GateConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }

    /// Get the credential validation section
    pub fn auth_config(&self) -> Result<&AuthConfig> {
        self.auth.as_ref().ok_or_else(|| {
            GateError::Config("[auth] section not found in config file".to_string())
        })
    }
}

/// Credential validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected token issuer, e.g. `https://pawpost.eu.auth0.com/`
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected audience (the API identifier)
    #[serde(default)]
    pub audience: Option<String>,

    /// Signing algorithm name (default: "HS256")
    #[serde(default)]
    pub algorithm: Option<String>,

    /// Shared secret for HS* algorithms
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM public key for RS*/PS*/ES*/EdDSA algorithms
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// JWKS endpoint publishing the provider's signing keys
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Tolerated clock skew in seconds
    #[serde(default)]
    pub leeway_secs: Option<u64>,
}

/// Where the verification key comes from, after validation of [`AuthConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial<'a> {
    Secret(&'a str),
    PublicKeyPem(&'a str),
    JwksUrl(&'a str),
}

impl AuthConfig {
    pub fn algorithm(&self) -> Result<Algorithm> {
        let name = self.algorithm.as_deref().unwrap_or("HS256");
        Algorithm::from_str(name)
            .map_err(|_| GateError::Config(format!("Unknown signing algorithm: {}", name)))
    }

    /// Exactly one of `secret`, `public_key_pem` or `jwks_url` must be set
    pub fn key_material(&self) -> Result<KeyMaterial<'_>> {
        let configured = [
            self.secret.as_deref().map(KeyMaterial::Secret),
            self.public_key_pem.as_deref().map(KeyMaterial::PublicKeyPem),
            self.jwks_url.as_deref().map(KeyMaterial::JwksUrl),
        ];
        let mut configured = configured.into_iter().flatten();

        match (configured.next(), configured.next()) {
            (Some(material), None) => Ok(material),
            (None, _) => Err(GateError::Config(
                "one of secret, public_key_pem or jwks_url is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(GateError::Config(
                "only one of secret, public_key_pem or jwks_url may be set".to_string(),
            )),
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            leeway_secs: self.leeway_secs.unwrap_or(0),
        }
    }
}

impl CredentialValidator {
    /// Build a validator from the `[auth]` section
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let algorithm = config.algorithm()?;
        let options = config.validation_options();

        match config.key_material()? {
            KeyMaterial::Secret(secret) => {
                CredentialValidator::with_secret(algorithm, secret.as_bytes(), options)
            }
            KeyMaterial::PublicKeyPem(pem) => {
                CredentialValidator::with_public_key_pem(algorithm, pem.as_bytes(), options)
            }
            #[cfg(feature = "remote-jwks")]
            KeyMaterial::JwksUrl(url) => {
                if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
                    return Err(GateError::Config(format!(
                        "{:?} cannot be used with jwks_url",
                        algorithm
                    )));
                }
                Ok(CredentialValidator::with_jwks(
                    crate::auth::JwksKeySource::new(url),
                    options,
                ))
            }
            #[cfg(not(feature = "remote-jwks"))]
            KeyMaterial::JwksUrl(_) => Err(GateError::Config(
                "jwks_url requires the remote-jwks feature".to_string(),
            )),
        }
    }
}

/// Permission requirement per route, validated when loaded
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    routes: HashMap<String, Permission>,
}

impl PermissionTable {
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let mut routes = HashMap::with_capacity(config.permissions.len());
        for (route, permission) in &config.permissions {
            let permission = Permission::new(permission).map_err(|e| {
                GateError::Config(format!("route '{}': {}", route, e))
            })?;
            routes.insert(route.clone(), permission);
        }
        Ok(Self { routes })
    }

    /// Requirement for `route`; a route without one cannot be registered
    pub fn permission_for(&self, route: &str) -> Result<Permission> {
        self.routes.get(route).cloned().ok_or_else(|| {
            GateError::Config(format!("no permission registered for route '{}'", route))
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GateConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| GateError::Config(format!("Failed to parse TOML config: {}", e)))
}
