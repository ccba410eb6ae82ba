use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use super::jwt;
use crate::error::AppError;
use crate::AppState;

/// Authenticated caller, taken from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub permissions: Vec<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        // Extract Bearer token from Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()).into_response())?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()).into_response())?;

        let claims = jwt::verify_jwt(token, &state.jwt_secret)
            .map_err(|e| AppError::from(e).into_response())?
            .claims;

        Ok(AuthUser {
            user_id: claims.sub,
            org_id: claims.org_id,
            permissions: claims.permissions,
        })
    }
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Require a specific permission, returning an error if not present
    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions {
                required: permission.to_string(),
            })
        }
    }
}
