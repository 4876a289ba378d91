//! Token minting helpers for unit tests

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

pub const TEST_SECRET: &[u8] = b"pawpost-test-secret";

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub struct TokenSpec {
    pub sub: String,
    pub exp: i64,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub permissions: Vec<String>,
}

impl TokenSpec {
    pub fn new(permissions: &[&str]) -> Self {
        Self {
            sub: "auth0|tester".to_string(),
            exp: now() + 3600,
            iss: None,
            aud: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

pub fn mint(spec: &TokenSpec) -> String {
    mint_with_secret(spec, TEST_SECRET)
}

pub fn mint_with_secret(spec: &TokenSpec, secret: &[u8]) -> String {
    let mut payload = json!({
        "sub": spec.sub,
        "exp": spec.exp,
        "iat": now(),
        "permissions": spec.permissions,
    });
    if let Some(iss) = &spec.iss {
        payload["iss"] = json!(iss);
    }
    if let Some(aud) = &spec.aud {
        payload["aud"] = json!(aud);
    }
    encode(&Header::default(), &payload, &EncodingKey::from_secret(secret)).unwrap()
}
