use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::errors::AppError;
use crate::verify::VerifiedIdentity;
use crate::AppState;

/// Extractor that verifies the bearer token against the identity provider
/// and yields the verified `{uid, email}` pair.
/// Use in handler signatures: `AuthUser(identity): AuthUser`
#[derive(Debug, Clone)]
pub struct AuthUser(pub VerifiedIdentity);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated("Missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthenticated("Invalid authorization format".into()))?;

        let identity = state.verifier.verify(token).await?;

        Ok(AuthUser(identity))
    }
}
