pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::types::Role;

pub use password::{hash_password, verify_password, BcryptError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, email: String, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self { sub: user_id, role, email, exp, iat: now.timestamp() }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("token expired")]
    Expired,

    #[error("{0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry; expiry is reported separately from other failures.
pub fn validate_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })
}

/// Issue a token for a freshly authenticated user.
pub fn issue_token(user_id: Uuid, role: Role, email: &str, security: &SecurityConfig) -> Result<String, JwtError> {
    let claims = Claims::new(user_id, role, email.to_string(), security.jwt_expiry_hours);
    generate_jwt(&claims, security)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn token_round_trip() {
        let security = AppConfig::development().security;
        let id = Uuid::new_v4();
        let token = issue_token(id, Role::Tutor, "t@example.com", &security).unwrap();
        let claims = validate_jwt(&token, &security).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Tutor);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let security = AppConfig::development().security;
        let mut claims = Claims::new(Uuid::new_v4(), Role::Student, "s@example.com".into(), 1);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = generate_jwt(&claims, &security).unwrap();
        assert!(matches!(validate_jwt(&token, &security), Err(JwtError::Expired)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let security = AppConfig::development().security;
        let token = issue_token(Uuid::new_v4(), Role::Admin, "a@example.com", &security).unwrap();
        let mut other = security.clone();
        other.jwt_secret = "another-secret".into();
        assert!(matches!(validate_jwt(&token, &other), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn missing_secret_refuses_to_sign() {
        let security = AppConfig::production().security;
        assert!(matches!(issue_token(Uuid::new_v4(), Role::Admin, "a@example.com", &security), Err(JwtError::InvalidSecret)));
    }
}
