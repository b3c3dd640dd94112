//! Authentication route handlers
//!
//! Registration, login, token refresh and the password flows.

use super::extract::ValidJson;
use crate::auth::{
    create_access_token, create_reset_token, create_tokens, decode_refresh_token,
    decode_reset_token, hash_password, verify_password, AuthUser, Role, TokenPair,
};
use crate::error::{not_found_error, ApiResult, AppError};
use crate::models::{validate_not_blank, MessageResponse, NewUser, SuccessResponse, User};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub last_name: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// User plus a fresh token pair
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenPayload {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct MePayload {
    pub user: User,
}

const FORGOT_PASSWORD_MESSAGE: &str = "If an account with that email exists, a reset link has been sent";

/// Emails are compared trimmed and lowercased
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================
// Route Handlers
// ============================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<AuthPayload>>)> {
    let email = normalize_email(&req.email);
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("User already exists".to_string()));
    }

    let user = state
        .store
        .create_user(NewUser {
            email,
            password_hash: hash_password(&req.password)?,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role: req.role.unwrap_or_default(),
        })
        .await?;

    let tokens = create_tokens(&state.jwt, user.id)?;
    info!("New user registered: {} ({})", user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "User registered successfully",
            AuthPayload { user, tokens },
        )),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<SuccessResponse<AuthPayload>>> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let mut user = state
        .store
        .find_user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }
    if !verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let now = Utc::now();
    state.store.record_login(user.id, now).await?;
    user.last_login = Some(now);

    let tokens = create_tokens(&state.jwt, user.id)?;
    debug!("User logged in: {}", user.email);

    Ok(Json(SuccessResponse::with_data(
        "Login successful",
        AuthPayload { user, tokens },
    )))
}

/// POST /api/auth/refresh
///
/// Exchange a refresh token for a new access token.
pub async fn refresh(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<Json<SuccessResponse<AccessTokenPayload>>> {
    let invalid = || AppError::Unauthorized("Invalid refresh token".to_string());

    let claims = decode_refresh_token(&state.jwt, &req.refresh_token).map_err(|_| invalid())?;
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    Ok(Json(SuccessResponse::with_data(
        "Token refreshed successfully",
        AccessTokenPayload {
            access_token: create_access_token(&state.jwt, user.id)?,
        },
    )))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = state
        .store
        .find_user(caller.id)
        .await?
        .ok_or_else(|| not_found_error("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    state
        .store
        .set_password(user.id, &hash_password(&req.new_password)?)
        .await?;
    info!("Password changed for {}", user.email);

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// POST /api/auth/forgot-password
///
/// Answers the same way whether or not the account exists. There is no mail
/// transport, so the reset token is only logged in development.
pub async fn forgot_password(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(user) = state
        .store
        .find_user_by_email(&normalize_email(&req.email))
        .await?
    {
        let token = create_reset_token(&state.jwt, user.id)?;
        info!("Password reset requested for {}", user.email);
        if state.environment == "development" {
            debug!(reset_token = %token, "Issued password reset token");
        }
    }

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let invalid = || AppError::BadRequest("Invalid or expired reset token".to_string());

    let claims = decode_reset_token(&state.jwt, &req.token).map_err(|_| invalid())?;
    let updated = state
        .store
        .set_password(claims.sub, &hash_password(&req.password)?)
        .await?;
    if !updated {
        return Err(invalid());
    }

    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Json<SuccessResponse<MePayload>>> {
    let user = state
        .store
        .find_user(caller.id)
        .await?
        .ok_or_else(|| not_found_error("User not found"))?;

    Ok(Json(SuccessResponse::new(MePayload { user })))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards them.
pub async fn logout(Extension(caller): Extension<AuthUser>) -> Json<MessageResponse> {
    debug!("User logged out: {}", caller.email);
    Json(MessageResponse::new("Logged out successfully"))
}
