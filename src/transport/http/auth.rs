use crate::domain::identity::{Principal, Role};
use crate::transport::http::error::ApiError;
use crate::transport::http::types::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The caller behind `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl Authenticated {
    pub fn require(&self, role: Role, action: &str) -> Result<(), ApiError> {
        if self.0.role.satisfies(role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{:?} accounts may not {}",
                self.0.role, action
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        state
            .token_verifier
            .verify(token)
            .map(Authenticated)
            .ok_or(ApiError::Unauthorized)
    }
}
