//! Remote JWKS key source with caching

use std::{collections::HashMap, time::{Duration, Instant}};

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use tokio::sync::{Mutex, RwLock};

use crate::error::{GateError, Result};

const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(3600);
const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Map a JWK's algorithm parameters to a `jsonwebtoken::Algorithm`
pub fn jwk_algorithm_to_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match &params.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            other => Err(GateError::SigningKey(format!(
                "Unsupported elliptic curve for JWK: {:?}",
                other
            ))),
        },
        AlgorithmParameters::OctetKey(_) => Err(GateError::SigningKey(
            "Symmetric keys are not accepted from a JWKS".to_string(),
        )),
        AlgorithmParameters::OctetKeyPair(_) => Ok(Algorithm::EdDSA),
    }
}

/// Parse a JWKS document into decoding keys by `kid`
///
/// Keys without a `kid` or with unsupported parameters are skipped.
pub fn parse_jwks(jwks_text: &str) -> Result<HashMap<String, KeyEntry>> {
    let jwk_set: JwkSet = serde_json::from_str(jwks_text)
        .map_err(|e| GateError::JwksFetch(format!("Failed to parse JWKS: {}", e)))?;

    let mut keys = HashMap::new();
    for jwk in jwk_set.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            tracing::warn!("JWK missing kid field, skipping");
            continue;
        };
        let algorithm = match jwk_algorithm_to_algorithm(&jwk) {
            Ok(algorithm) => algorithm,
            Err(e) => {
                tracing::warn!("Unsupported algorithm for kid {}: {}", kid, e);
                continue;
            }
        };
        match DecodingKey::from_jwk(&jwk) {
            Ok(decoding_key) => {
                tracing::debug!("Parsed key {}: algorithm={:?}", kid, algorithm);
                keys.insert(kid, (decoding_key, algorithm));
            }
            Err(err) => {
                tracing::warn!("Failed to create decoding key for kid {}: {}", kid, err);
            }
        }
    }

    Ok(keys)
}

/// A decoding key and the algorithm it verifies
pub type KeyEntry = (DecodingKey, Algorithm);

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, KeyEntry>,
    fetched_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

impl KeyCache {
    /// Answer from the cache, or `None` when a refetch is due
    fn lookup(
        &self,
        kid: &str,
        cache_duration: Duration,
        min_refresh_interval: Duration,
    ) -> Option<Result<Option<KeyEntry>>> {
        let fresh = self
            .fetched_at
            .is_some_and(|fetched_at| fetched_at.elapsed() < cache_duration);
        if fresh {
            if let Some(entry) = self.keys.get(kid) {
                return Some(Ok(Some(entry.clone())));
            }
        }

        let throttled = self
            .last_attempt
            .is_some_and(|attempt| attempt.elapsed() < min_refresh_interval);
        if !throttled {
            return None;
        }

        if self.fetched_at.is_some() {
            Some(Ok(self.keys.get(kid).cloned()))
        } else {
            Some(Err(GateError::JwksFetch(
                "JWKS unavailable and refetch is throttled".to_string(),
            )))
        }
    }
}

/// Signing keys published at a JWKS URL, e.g.
/// `https://<tenant>.auth0.com/.well-known/jwks.json`
///
/// Refetches are serialized and spaced at least `min_refresh_interval`
/// apart, so tokens carrying unknown `kid`s cannot drive traffic to the
/// identity provider.
pub struct JwksKeySource {
    http_client: Client,
    jwks_url: String,
    cache: RwLock<KeyCache>,
    refresh: Mutex<()>,
    cache_duration: Duration,
    min_refresh_interval: Duration,
}

impl JwksKeySource {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            jwks_url: jwks_url.into(),
            cache: RwLock::new(KeyCache::default()),
            refresh: Mutex::new(()),
            cache_duration: DEFAULT_CACHE_DURATION,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Override how long fetched keys are trusted before refetching
    pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
        self.cache_duration = cache_duration;
        self
    }

    /// Override the minimum spacing between two refetches
    pub fn with_min_refresh_interval(mut self, min_refresh_interval: Duration) -> Self {
        self.min_refresh_interval = min_refresh_interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Find the key for `kid`
    ///
    /// A fresh cache is consulted first. A miss or a stale cache triggers a
    /// refetch, which also picks up rotated keys, unless one was attempted
    /// within the minimum refresh interval. When a refetch fails, previously
    /// fetched keys keep being served. `Ok(None)` means the provider does not
    /// publish that `kid`.
    pub async fn key_for(&self, kid: &str) -> Result<Option<KeyEntry>> {
        if let Some(found) =
            self.cache
                .read()
                .await
                .lookup(kid, self.cache_duration, self.min_refresh_interval)
        {
            return found;
        }

        let _refresh = self.refresh.lock().await;
        // another request may have refetched while this one waited
        if let Some(found) =
            self.cache
                .read()
                .await
                .lookup(kid, self.cache_duration, self.min_refresh_interval)
        {
            return found;
        }

        tracing::debug!("Refreshing JWKS for kid {}", kid);
        let attempted_at = Instant::now();
        let fetched = self.fetch().await;

        let mut cache = self.cache.write().await;
        cache.last_attempt = Some(attempted_at);
        match fetched {
            Ok(keys) => {
                let found = keys.get(kid).cloned();
                cache.keys = keys;
                cache.fetched_at = Some(attempted_at);
                Ok(found)
            }
            Err(e) if cache.fetched_at.is_some() => {
                tracing::warn!("JWKS refresh failed, serving cached keys: {}", e);
                Ok(cache.keys.get(kid).cloned())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self) -> Result<HashMap<String, KeyEntry>> {
        tracing::debug!("Fetching JWKS from: {}", self.jwks_url);

        let response = self
            .http_client
            .get(&self.jwks_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| GateError::JwksFetch(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(GateError::JwksFetch(format!(
                "JWKS fetch failed with status: {}",
                response.status()
            )));
        }

        let jwks_text = response
            .text()
            .await
            .map_err(|e| GateError::JwksFetch(format!("Failed to read JWKS response: {}", e)))?;

        parse_jwks(&jwks_text)
    }
}
