//! Access tokens
//!
//! HS256 JWTs carrying the username as `sub` and a random `jti`.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_SECRET_KEY_SIZE: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid secret key size: must have at least {MIN_SECRET_KEY_SIZE} characters")]
    KeyTooShort,

    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("Failed to generate token: {0}")]
    Encode(String),
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Token id
    pub jti: Uuid,
    /// Username
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenMaker {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::KeyTooShort);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issue a token for `username` valid for `duration`
    pub fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Claims), TokenError> {
        let now = Utc::now();
        let claims = Claims {
            jti: Uuid::new_v4(),
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok((token, claims))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
