//! Bearer-token authentication for the `/api` routes.
//!
//! Tokens are HS256 JWTs carrying `sub`, `role`, an optional `email` and
//! `exp`. Handlers take an [`AuthenticatedCaller`] argument to require one.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::handlers::AppState;

/// Claims the gateway reads from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: String,
    pub exp: u64,
}

/// Validates access tokens signed with the shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decodes and validates `token`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for a bad signature, a malformed
    /// token or an expired one.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token expired".to_string()),
                ErrorKind::InvalidSignature => {
                    ApiError::Unauthorized("Invalid token signature".to_string())
                }
                _ => ApiError::Unauthorized(format!("Invalid token: {err}")),
            })
    }
}

/// Caller identity extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub claims: Claims,
}

impl AuthenticatedCaller {
    /// Stable key for per-caller accounting.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}

impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.auth.verify(token)?;
        Ok(Self { claims })
    }
}
