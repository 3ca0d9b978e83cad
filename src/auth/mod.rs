pub mod roles;
pub mod verifier;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Serialize;

use crate::{auth::roles::Role, error::AppError, state::AppState};

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let identity = state
            .verifier
            .verify_token(bearer.token())
            .await
            .map_err(|_| AppError::unauthorized())?;

        let role = roles::resolve_role(&state.config.access, &identity.email)
            .ok_or_else(|| AppError::forbidden("domain or user not allowed"))?;

        Ok(AuthenticatedUser {
            email: identity.email,
            role,
        })
    }
}
