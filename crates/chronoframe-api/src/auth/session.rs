//! Session cookie verification.
//!
//! Sessions are issued elsewhere; this side only checks the HS256 signature and
//! expiry of the token carried in the session cookie and reads the acting user.

use axum::http::{header::COOKIE, HeaderMap};
use chronoframe_core::models::UserRef;
use chronoframe_core::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct SessionVerifier {
    cookie_name: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<UserRef, AppError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Session expired".to_string())
                }
                _ => AppError::Unauthorized(format!("Invalid session token: {}", e)),
            })?;

        let id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid session subject".to_string()))?;

        Ok(UserRef {
            id,
            name: data.claims.name,
        })
    }

    /// The acting user, or `None` when the cookie is absent or fails verification.
    pub fn user_from_headers(&self, headers: &HeaderMap) -> Option<UserRef> {
        let token = session_cookie(headers, &self.cookie_name)?;
        match self.verify_token(&token) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session cookie");
                None
            }
        }
    }
}

fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie, _)| *cookie == name)
        .map(|(_, value)| value.to_string())
}
