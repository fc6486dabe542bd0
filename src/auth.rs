use crate::access::{is_allowed, Permission, Role};
use crate::db_storage::CrmStorage;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::User;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Hex-encoded SHA-256 digest of an API token. Only digests are stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Fresh 64-character API token.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn role(&self) -> Role {
        self.0.role()
    }

    /// Fails with 403 unless the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        let role = self.role();
        if is_allowed(role, permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not allowed to {}",
                role,
                permission.as_str()
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
        let digest = hash_token(token);

        if let Some(user) = state.auth_cache.get(&digest).await {
            return Ok(AuthUser(user));
        }

        let storage = CrmStorage::new(state.db.clone());
        let user = storage
            .find_user_by_token_hash(&digest)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown API token".to_string()))?;

        tracing::debug!("Authenticated {} ({})", user.email, user.role);
        state.auth_cache.insert(digest, user.clone()).await;
        Ok(AuthUser(user))
    }
}
