//! External identity verification seam.
//!
//! Requests carry a bearer token minted by the identity provider; the
//! backend only verifies it and extracts `{uid, email}`. Every failure
//! class (expired, malformed, bad signature) collapses to Unauthenticated
//! at this boundary.

use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity>;
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    email: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Validates HMAC-signed identity tokens.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthenticated(format!("Invalid identity token: {e}")))?;
        Ok(VerifiedIdentity {
            uid: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Token → identity map for tests. Unknown tokens fail like any other
/// verification failure.
#[derive(Default)]
pub struct StaticVerifier {
    identities: DashMap<String, VerifiedIdentity>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: &str, uid: &str, email: &str) {
        self.identities.insert(
            token.to_string(),
            VerifiedIdentity { uid: uid.to_string(), email: email.to_string() },
        );
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        self.identities
            .get(token)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::Unauthenticated("Invalid identity token".into()))
    }
}
