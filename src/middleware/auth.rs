//! Bearer-token authentication.
//!
//! A session token is `<user_uuid>.<hex HMAC-SHA256(secret, user_uuid)>`.
//! Tokens are minted by the identity provider (or `token issue` on the CLI)
//! with the shared `SESSION_SECRET`; this service only verifies them.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Actor;
use crate::error::AppError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Missing bearer token")]
    Missing,
    #[error("Malformed bearer token")]
    Malformed,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Unusable signing key")]
    InvalidKey,
}

fn mac_for(secret: &str, user_id: Uuid) -> Result<HmacSha256, TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidKey)?;
    mac.update(user_id.to_string().as_bytes());
    Ok(mac)
}

pub fn issue_token(secret: &str, user_id: Uuid) -> Result<String, TokenError> {
    let signature = mac_for(secret, user_id)?.finalize().into_bytes();
    Ok(format!("{}.{}", user_id, hex::encode(signature)))
}

/// Returns the user id the token was issued for.
pub fn verify_token(secret: &str, token: &str) -> Result<Uuid, TokenError> {
    let (user, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
    let user_id = Uuid::parse_str(user).map_err(|_| TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

    mac_for(secret, user_id)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    Ok(user_id)
}

/// Reads the bearer token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, TokenError> {
    let header = header.ok_or(TokenError::Missing)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(TokenError::Malformed)?;
    if token.trim().is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

/// The authenticated caller. Rejects with 401 when the token is missing or
/// does not verify.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user_id = bearer_token(header)
            .and_then(|token| verify_token(&state.config.session_secret, token))
            .map_err(|err| {
                tracing::debug!(error = %err, "Rejected credentials");
                AppError::Unauthorized(err.to_string())
            })?;

        let actor = if state.config.is_admin(user_id) {
            Actor::admin(user_id)
        } else {
            Actor::user(user_id)
        };

        Ok(AuthUser(actor))
    }
}

/// Like [`AuthUser`] for public routes: no header means an anonymous
/// caller, but a header that fails to verify is still a 401.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Actor>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeAuthUser(None));
        }
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        Ok(MaybeAuthUser(Some(actor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    #[test]
    fn issued_token_verifies() {
        let user = Uuid::new_v4();
        let token = issue_token(SECRET, user).unwrap();
        assert!(token.starts_with(&user.to_string()));
        assert_eq!(verify_token(SECRET, &token), Ok(user));
    }

    #[test]
    fn wrong_secret_or_user_fails() {
        let user = Uuid::new_v4();
        let token = issue_token(SECRET, user).unwrap();
        assert_eq!(
            verify_token("another-secret-value", &token),
            Err(TokenError::BadSignature)
        );

        let signature = token.split_once('.').unwrap().1;
        let forged = format!("{}.{}", Uuid::new_v4(), signature);
        assert_eq!(verify_token(SECRET, &forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn malformed_tokens() {
        assert_eq!(verify_token(SECRET, "nodot"), Err(TokenError::Malformed));
        assert_eq!(verify_token(SECRET, "not-a-uuid.abcd"), Err(TokenError::Malformed));
        let bad_hex = format!("{}.zzzz", Uuid::new_v4());
        assert_eq!(verify_token(SECRET, &bad_hex), Err(TokenError::Malformed));
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(None), Err(TokenError::Missing));
        assert_eq!(bearer_token(Some("Bearer  ")), Err(TokenError::Missing));
        assert_eq!(bearer_token(Some("Basic abc")), Err(TokenError::Malformed));
    }
}
