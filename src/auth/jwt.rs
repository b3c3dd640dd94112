//! JWT token management
//!
//! Handles creation, validation, and refresh of JWT tokens. Access and
//! password-reset tokens are signed with the access secret, refresh tokens
//! with a separate refresh secret.

use crate::config::JwtConfig;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Password reset token lifetime (1 hour)
const RESET_TOKEN_EXPIRATION_HOURS: i64 = 1;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Reset,
}

/// Token pair returned on register and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn sign(
    user_id: Uuid,
    token_type: TokenType,
    ttl: Duration,
    secret: &str,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create {:?} token: {}", token_type, e)))
}

fn verify(token: &str, secret: &str, expected: TokenType) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    if token_data.claims.token_type != expected {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }

    Ok(token_data.claims)
}

/// Create access and refresh tokens for a user
pub fn create_tokens(config: &JwtConfig, user_id: Uuid) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: create_access_token(config, user_id)?,
        refresh_token: sign(
            user_id,
            TokenType::Refresh,
            config.refresh_ttl,
            &config.refresh_secret,
        )?,
    })
}

pub fn create_access_token(config: &JwtConfig, user_id: Uuid) -> Result<String, AppError> {
    sign(user_id, TokenType::Access, config.access_ttl, &config.access_secret)
}

/// Create a short-lived token for the forgot/reset password flow
pub fn create_reset_token(config: &JwtConfig, user_id: Uuid) -> Result<String, AppError> {
    sign(
        user_id,
        TokenType::Reset,
        Duration::hours(RESET_TOKEN_EXPIRATION_HOURS),
        &config.access_secret,
    )
}

pub fn decode_access_token(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    verify(token, &config.access_secret, TokenType::Access)
}

pub fn decode_refresh_token(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    verify(token, &config.refresh_secret, TokenType::Refresh)
}

pub fn decode_reset_token(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    verify(token, &config.access_secret, TokenType::Reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            access_secret: "access".to_string(),
            refresh_secret: "refresh".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let cfg = config();
        let user_id = Uuid::new_v4();
        let pair = create_tokens(&cfg, user_id).unwrap();

        let claims = decode_access_token(&cfg, &pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let cfg = config();
        let pair = create_tokens(&cfg, Uuid::new_v4()).unwrap();

        // signed with a different secret
        assert!(decode_access_token(&cfg, &pair.refresh_token).is_err());
        assert!(decode_refresh_token(&cfg, &pair.access_token).is_err());
        assert!(decode_refresh_token(&cfg, &pair.refresh_token).is_ok());
    }

    #[test]
    fn test_reset_token_rejected_as_access() {
        let cfg = config();
        let token = create_reset_token(&cfg, Uuid::new_v4()).unwrap();
        match decode_access_token(&cfg, &token) {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Invalid token type"),
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }
        assert!(decode_reset_token(&cfg, &token).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let mut cfg = config();
        cfg.access_ttl = Duration::hours(-2);
        let token = create_access_token(&cfg, Uuid::new_v4()).unwrap();
        match decode_access_token(&cfg, &token) {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }
    }
}
