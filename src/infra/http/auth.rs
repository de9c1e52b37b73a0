//! Bearer token verification for the request viewer.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::viewer::Viewer;
use crate::domain::entities::UserId;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by access tokens issued by the account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("authorization header is not a bearer token")]
    Scheme,
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token type `{0}` is not an access token")]
    WrongType(String),
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolve an `Authorization` header value; no header means anonymous.
    pub fn viewer(&self, header: Option<&str>) -> Result<Viewer, TokenError> {
        let Some(raw) = header else {
            return Ok(Viewer::Anonymous);
        };
        let token = raw
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::Scheme)?;

        let claims = decode::<AccessClaims>(token, &self.key, &self.validation)?.claims;
        match claims.token_type.as_deref() {
            None | Some(ACCESS_TOKEN_TYPE) => Ok(Viewer::User(claims.user_id)),
            Some(other) => Err(TokenError::WrongType(other.to_string())),
        }
    }
}
