//! Bearer credential validation
//!
//! Turns a raw `Authorization` header value into verified [`Claims`]:
//!
//! 1. the header must be `Bearer <token>`;
//! 2. the token signature is verified against the configured key source;
//! 3. expiry and, when configured, issuer and audience are checked.
//!
//! Failures are reported as the most specific [`AuthError`] kind. The
//! underlying `jsonwebtoken` error is only logged.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
#[cfg(feature = "remote-jwks")]
use jsonwebtoken::Header;

use super::claims::{Claims, TokenClaims};
use super::error::AuthError;
#[cfg(feature = "remote-jwks")]
use super::jwks::JwksKeySource;
use crate::error::{GateError, Result};

/// Where verification keys come from
pub enum KeySource {
    /// A single locally configured key
    Static {
        key: DecodingKey,
        algorithm: Algorithm,
    },
    /// Keys published by the identity provider, selected by `kid`
    #[cfg(feature = "remote-jwks")]
    Remote(JwksKeySource),
}

/// Claim constraints beyond signature and expiry
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Required `iss`; unchecked when `None`
    pub issuer: Option<String>,
    /// Required member of `aud`; unchecked when `None`
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`
    pub leeway_secs: u64,
}

/// Validates bearer credentials and produces [`Claims`]
///
/// Holds read-only key material and may be shared across requests.
pub struct CredentialValidator {
    keys: KeySource,
    options: ValidationOptions,
}

impl CredentialValidator {
    pub fn new(keys: KeySource, options: ValidationOptions) -> Self {
        Self { keys, options }
    }

    /// Verify with a shared HMAC secret (HS256, HS384 or HS512)
    pub fn with_secret(
        algorithm: Algorithm,
        secret: &[u8],
        options: ValidationOptions,
    ) -> Result<Self> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(GateError::SigningKey(format!(
                "{:?} cannot be used with a shared secret",
                algorithm
            )));
        }
        if secret.is_empty() {
            return Err(GateError::SigningKey("shared secret must not be empty".to_string()));
        }
        let keys = KeySource::Static {
            key: DecodingKey::from_secret(secret),
            algorithm,
        };
        Ok(Self::new(keys, options))
    }

    /// Verify with a PEM-encoded RSA, EC or Ed25519 public key
    pub fn with_public_key_pem(
        algorithm: Algorithm,
        pem: &[u8],
        options: ValidationOptions,
    ) -> Result<Self> {
        let key = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(GateError::SigningKey(format!(
                    "{:?} requires a shared secret, not a public key",
                    algorithm
                )))
            }
        }
        .map_err(|e| GateError::SigningKey(format!("Invalid public key: {}", e)))?;

        Ok(Self::new(KeySource::Static { key, algorithm }, options))
    }

    /// Verify against keys published at a JWKS endpoint
    #[cfg(feature = "remote-jwks")]
    pub fn with_jwks(jwks: JwksKeySource, options: ValidationOptions) -> Self {
        Self::new(KeySource::Remote(jwks), options)
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate a raw `Authorization` header value
    pub async fn validate(&self, raw_header: Option<&str>) -> std::result::Result<Claims, AuthError> {
        let token = parse_bearer(raw_header)?;
        self.validate_token(token).await
    }

    /// Validate an already-extracted bearer token
    pub async fn validate_token(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("Invalid JWT header: {}", e);
            AuthError::MalformedToken
        })?;

        let decoded = match &self.keys {
            KeySource::Static { key, algorithm } => {
                decode::<TokenClaims>(token, key, &self.validation(*algorithm))
            }
            #[cfg(feature = "remote-jwks")]
            KeySource::Remote(jwks) => {
                let (key, algorithm) = remote_key(jwks, &header).await?;
                decode::<TokenClaims>(token, &key, &self.validation(algorithm))
            }
        };

        let token_data = decoded.map_err(|e| {
            tracing::debug!(alg = ?header.alg, "JWT validation failed: {}", e);
            map_jwt_error(e.kind())
        })?;

        Ok(Claims::from(token_data.claims))
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.options.leeway_secs;

        // a configured constraint also makes its claim mandatory
        let mut required = vec!["exp"];
        if self.options.issuer.is_some() {
            required.push("iss");
        }
        if self.options.audience.is_some() {
            required.push("aud");
        }
        validation.set_required_spec_claims(&required);

        if let Some(issuer) = &self.options.issuer {
            validation.set_issuer(&[issuer]);
        }

        match &self.options.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

#[cfg(feature = "remote-jwks")]
async fn remote_key(
    jwks: &JwksKeySource,
    header: &Header,
) -> std::result::Result<(DecodingKey, Algorithm), AuthError> {
    let kid = header.kid.as_deref().ok_or_else(|| {
        tracing::debug!("JWT missing kid in header");
        AuthError::MalformedToken
    })?;

    let (key, key_algorithm) = match jwks.key_for(kid).await {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            tracing::debug!("No key found for kid: {}", kid);
            return Err(AuthError::InvalidSignature);
        }
        Err(e) => {
            tracing::warn!("Could not load signing keys from {}: {}", jwks.jwks_url(), e);
            return Err(AuthError::KeysUnavailable);
        }
    };

    if header.alg != key_algorithm {
        tracing::warn!(
            "JWT header algorithm ({:?}) doesn't match key algorithm ({:?}) for kid {}. Using key algorithm.",
            header.alg,
            key_algorithm,
            kid
        );
    }

    Ok((key, key_algorithm))
}

/// Extract the token from an `Authorization` header value
///
/// Accepts exactly two whitespace-separated parts, the first being `Bearer`
/// in any case.
pub fn parse_bearer(raw_header: Option<&str>) -> std::result::Result<&str, AuthError> {
    let raw_header = raw_header.ok_or(AuthError::MissingHeader)?;

    let mut parts = raw_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::InvalidAudience,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidEcdsaKey => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken,
    }
}
