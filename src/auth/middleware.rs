//! Authentication middleware
//!
//! Validates the bearer token, loads the caller and makes it available to
//! handlers as an [`AuthUser`] request extension.

use crate::auth::{decode_access_token, Role};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;
use uuid::Uuid;

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Reject requests without a valid access token for an active user
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Access denied. No token provided.".to_string()))?;

    let claims = decode_access_token(&state.jwt, bearer.token())?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token. User not found.".to_string()))?;

    if !user.is_active {
        debug!("Rejected token for deactivated user {}", user.id);
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Require one of the given roles
pub fn require_role(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "Insufficient permissions: {} role cannot perform this action",
        user.role
    )))
}

/// Users may act on their own record; admins and managers on anyone's
pub fn ensure_self_or_manager(user: &AuthUser, target: Uuid) -> Result<(), AppError> {
    if user.id == target || user.role.is_manager() {
        return Ok(());
    }

    Err(AppError::Forbidden("Access denied".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "rep@crm.test".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_role() {
        let rep = caller(Role::SalesRep);
        assert!(require_role(&rep, &[Role::Admin, Role::Manager]).is_err());
        assert!(require_role(&caller(Role::Manager), &[Role::Admin, Role::Manager]).is_ok());
        assert!(require_role(&caller(Role::Manager), &[Role::Admin]).is_err());
    }

    #[test]
    fn test_self_or_manager() {
        let rep = caller(Role::Marketing);
        assert!(ensure_self_or_manager(&rep, rep.id).is_ok());
        assert!(matches!(
            ensure_self_or_manager(&rep, Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_self_or_manager(&caller(Role::Admin), Uuid::new_v4()).is_ok());
    }
}
