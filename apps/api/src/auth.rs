//! JWT authentication module.
//!
//! Handles token issuing and validation, and the [`AuthUser`] extractor every
//! `/api` handler takes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Branch the user works at, if any
    #[serde(default)]
    pub branch_id: Option<String>,

    /// Role name, e.g. "PHARMACIST"
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager (HS256).
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issue an access token.
    pub fn issue(&self, user_id: &str, branch_id: Option<&str>, role: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            branch_id: branch_id.map(str::to_string),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
            ApiError::internal()
        })
    }

    /// Validate and decode a token.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected token");
                ApiError::unauthorized("Invalid token")
            })?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub branch_id: Option<String>,
    pub role: String,
}

impl AuthUser {
    /// The explicitly requested branch, else the user's own, else all branches.
    pub fn scope<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.branch_id.as_deref())
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Authorization header missing"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.validate(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            branch_id: claims.branch_id,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-0123456789", 3600);

        let token = manager.issue("user-1", Some("branch-1"), "PHARMACIST").unwrap();
        let claims = manager.validate(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.branch_id.as_deref(), Some("branch-1"));
        assert_eq!(claims.role, "PHARMACIST");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("test-secret-0123456789", 3600);
        let other = JwtManager::new("another-secret-9876543210", 3600);

        let token = issuer.issue("user-1", None, "CASHIER").unwrap();
        let err = other.validate(&token).unwrap_err();
        assert_eq!(err.code, "UNAUTHORIZED");
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60s leeway.
        let manager = JwtManager::new("test-secret-0123456789", -120);
        let token = manager.issue("user-1", None, "CASHIER").unwrap();
        assert!(manager.validate(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_scope_prefers_requested_branch() {
        let user = AuthUser {
            user_id: "u".to_string(),
            branch_id: Some("branch-1".to_string()),
            role: "CASHIER".to_string(),
        };
        assert_eq!(user.scope(Some("branch-2")), Some("branch-2"));
        assert_eq!(user.scope(None), Some("branch-1"));
    }
}
