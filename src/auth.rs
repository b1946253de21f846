use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::models::{AuthPayload, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    Missing,
    #[error("access token is expired")]
    Expired,
    #[error("access token validation error: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_identity(&self, credential: Option<&str>) -> Result<Identity, AuthError>;
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// HS256 signing keys for access tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

/// Longest token lifetime accepted from configuration.
pub const MAX_TOKEN_TTL: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 60 * 60);
const FALLBACK_TOKEN_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

impl JwtKeys {
    /// A zero TTL or one above [`MAX_TOKEN_TTL`] is replaced by one hour, with a warning.
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Self {
        let ttl = if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
            tracing::warn!(
                requested_secs = ttl.as_secs(),
                fallback_secs = FALLBACK_TOKEN_TTL.as_secs(),
                "token TTL out of range, using fallback"
            );
            FALLBACK_TOKEN_TTL
        } else {
            ttl
        };
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl.as_secs() as i64),
        }
    }

    pub fn create_jwt(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = AuthPayload {
            sub: user_id.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn validate_jwt(&self, token: &str) -> Result<AuthPayload, AuthError> {
        match decode::<AuthPayload>(token, &self.decoding, &Validation::new(Algorithm::HS256)) {
            Ok(token_data) => Ok(token_data.claims),
            Err(e) if e.kind() == &ErrorKind::ExpiredSignature => Err(AuthError::Expired),
            Err(e) => Err(AuthError::Invalid(e)),
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtKeys {
    async fn resolve_identity(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential.ok_or(AuthError::Missing)?;
        let claims = self.validate_jwt(token)?;
        Ok(Identity::new(claims.sub))
    }
}
