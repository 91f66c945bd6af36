//! HS256 access tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime when `ZAMAN_TOKEN_TTL_MINUTES` is unset
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token returned by signup and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

/// Issues and verifies access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Sign a token for `username`
    pub fn issue(&self, username: &str) -> anyhow::Result<AccessToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(AccessToken {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
