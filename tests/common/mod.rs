//! Shared helpers for integration tests

#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use jwt_auth_provider::config::{AuthenticationConfig, Config, LoggingConfig, ServerConfig};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const SECRET: &str = "super-secret-key-for-testing";

/// Sign `claims` with HS256
pub fn hs256_token(secret: &str, claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn expires_in(hours: i64) -> i64 {
    (chrono::Utc::now() + chrono::Duration::hours(hours)).timestamp()
}

/// Claims carrying everything the identity mapping reads
pub fn user_claims() -> Value {
    json!({
        "id": "u1",
        "sub": "s1",
        "roles": "admin",
        "email": "a@b.com",
        "name": "Alice",
        "claim_id": "c-1",
        "exp": expires_in(1),
    })
}

/// Provider config for the built-in JWT module
pub fn jwt_provider_config(secret: &str) -> Value {
    json!({
        "authorizer": {
            "secret": secret,
            "algorithm": "HS256",
        }
    })
}

pub fn test_config(secret: &str) -> Config {
    let mut providers = BTreeMap::new();
    providers.insert("jwt".to_string(), jwt_provider_config(secret));
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
        },
        authentication: AuthenticationConfig { providers },
        logging: LoggingConfig::default(),
    }
}
