use anyhow::Result;
use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// The principal attested by the external identity provider.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: String,
}

/// Verifies an opaque identity token and yields the principal's email.
/// Failure means the caller is unauthenticated, never a role problem.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

/// HS256 token verification against the shared login secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl JwtVerifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<IdentityClaims>(token, &self.decoding, &validation)?;
        Ok(VerifiedIdentity {
            email: data.claims.email.trim().to_lowercase(),
        })
    }
}
