//! Caller identity.
//!
//! Authentication and session issuance live in an external auth provider.
//! A trusted gateway forwards the authenticated user's id in a configurable
//! header; this module resolves that id to a user row and exposes it as an
//! axum extractor. Role checks happen per-handler.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::db::{Role, User, UserStatus};
use crate::AppState;

use super::error::ApiError;

/// The authenticated caller, resolved from the gateway identity header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn role(&self) -> Option<Role> {
        self.0.role()
    }

    /// Fail with `Forbidden` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        match self.role() {
            Some(role) if roles.contains(&role) => Ok(()),
            _ => Err(ApiError::forbidden(
                "You do not have permission to perform this action",
            )),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = &state.config.auth.identity_header;
        let caller_id = parts
            .headers
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing authenticated identity"))?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(caller_id)
            .fetch_optional(&state.db)
            .await?;

        let user = user.ok_or_else(|| ApiError::unauthorized("Unknown user identity"))?;

        if user.status() != Some(UserStatus::Active) {
            return Err(ApiError::forbidden("This account is not active"));
        }

        Ok(AuthUser(user))
    }
}
