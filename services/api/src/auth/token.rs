//! services/api/src/auth/token.rs
//!
//! Issues and verifies the signed session tokens presented as bearer credentials.
//!
//! - Tokens are signed with HS256 using the shared `SECRET_KEY`.
//! - Access tokens default to 30 minutes, refresh tokens last 30 days.
//! - Refresh tokens carry `"type": "refresh"`; access tokens carry no type.
//! - Tokens are stateless. There is no revocation list, so a refresh token
//!   stays valid until it expires.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Lifetime of a refresh token.
pub fn refresh_token_ttl() -> Duration {
    Duration::days(30)
}

/// Payload stored in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's phone number.
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Present only on refresh tokens.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(REFRESH_TOKEN_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Malformed token")]
    Malformed,
    #[error("Token is not a refresh token")]
    WrongType,
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and verifies session tokens without any server-side state.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Access token expiring after the configured TTL.
    pub fn issue_access(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_access_with_ttl(subject, self.access_ttl)
    }

    /// Access token with an explicit lifetime.
    pub fn issue_access_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        self.sign(subject, ttl, None)
    }

    /// Refresh token valid for 30 days.
    pub fn issue_refresh(&self, subject: &str) -> Result<String, TokenError> {
        self.sign(subject, refresh_token_ttl(), Some(REFRESH_TOKEN_TYPE))
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject)?,
            refresh_token: self.issue_refresh(subject)?,
        })
    }

    /// Checks signature and expiry. Does not look at the token type.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })
    }

    /// As [`TokenService::verify`], and additionally requires the refresh marker.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if !claims.is_refresh() {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn sign(&self, subject: &str, ttl: Duration, token_type: Option<&str>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            token_type: token_type.map(str::to_string),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    let token = header_value?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
