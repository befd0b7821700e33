//! JWT token handling

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use podium_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::users::{User, ROLE_USER, ROLE_WRITER};
use crate::error::ApiError;
use crate::state::AppState;

/// Refresh token expiration in days
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
    pub roles: Vec<String>,
    /// Token type: "access" or "refresh"
    pub token_type: String,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.token_type == ACCESS
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Expiration in seconds
    pub expires_in: i64,
}

/// Signs and verifies tokens with the configured secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], expiration_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiration_hours,
        }
    }

    /// Issues an access and a refresh token for `user`.
    pub fn issue(&self, user: &User) -> Result<TokenResponse> {
        let now = Utc::now();
        let access = Claims {
            sub: user.id.clone(),
            username: Some(user.username.clone()),
            exp: (now + Duration::hours(self.expiration_hours)).timestamp(),
            iat: now.timestamp(),
            roles: user.roles.clone(),
            token_type: ACCESS.to_string(),
        };
        let refresh = Claims {
            sub: user.id.clone(),
            username: None,
            exp: (now + Duration::days(REFRESH_TOKEN_EXPIRATION_DAYS)).timestamp(),
            iat: now.timestamp(),
            roles: vec![],
            token_type: REFRESH.to_string(),
        };

        Ok(TokenResponse {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.expiration_hours * 3600,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("failed to create token: {}", e)))
    }

    /// Verifies signature and expiry of `token`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| Error::Unauthorized(format!("invalid token: {}", e)))
    }
}

/// Create token request
#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub username: String,
    pub password: String,
}

/// Create a new token
///
/// POST /.account/token
pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<CreateTokenRequest>,
) -> std::result::Result<Json<TokenResponse>, ApiError> {
    let user = state
        .users
        .validate_credentials(&req.username, &req.password)?;
    Ok(Json(state.tokens.issue(&user)?))
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Refresh a token
///
/// POST /.account/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> std::result::Result<Json<TokenResponse>, ApiError> {
    let claims = state.tokens.verify(&req.refresh_token)?;
    if claims.token_type != REFRESH {
        return Err(Error::Unauthorized("invalid token type".to_string()).into());
    }

    let user = state
        .users
        .get_user(&claims.sub)
        .filter(|u| u.active)
        .ok_or_else(|| Error::Unauthorized("account no longer exists".to_string()))?;
    Ok(Json(state.tokens.issue(&user)?))
}

/// Register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Registered account
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
    pub username: String,
}

/// Register a new account
///
/// POST /.account/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> std::result::Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if req.username.trim().is_empty() || req.password.len() < 8 {
        return Err(Error::BadRequest(
            "username must not be empty and password needs at least 8 characters".to_string(),
        )
        .into());
    }
    let user = state.users.create_user(
        &req.username,
        &req.password,
        vec![ROLE_USER.to_string(), ROLE_WRITER.to_string()],
    )?;
    tracing::info!(username = %user.username, "registered account");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserStore;

    #[test]
    fn test_issue_and_verify() {
        let users = UserStore::new();
        let user = users
            .create_user("alice", "password123", vec![ROLE_WRITER.into()])
            .unwrap();
        let issuer = TokenIssuer::new(b"test-secret", 1);

        let tokens = issuer.issue(&user).unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 3600);

        let claims = issuer.verify(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(claims.is_access());
        assert!(claims.has_role(ROLE_WRITER));

        let refresh = issuer.verify(&tokens.refresh_token).unwrap();
        assert!(!refresh.is_access());
        assert!(refresh.roles.is_empty());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let users = UserStore::new();
        let user = users.create_user("alice", "password123", vec![]).unwrap();
        let tokens = TokenIssuer::new(b"one", 1).issue(&user).unwrap();

        let err = TokenIssuer::new(b"two", 1)
            .verify(&tokens.access_token)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let users = UserStore::new();
        let user = users.create_user("alice", "password123", vec![]).unwrap();
        let issuer = TokenIssuer::new(b"secret", -2);
        let tokens = issuer.issue(&user).unwrap();
        assert!(issuer.verify(&tokens.access_token).is_err());
    }
}
