//! User management route handlers

use super::extract::{AppJson, AppPath, AppQuery, ValidJson};
use crate::auth::{ensure_self_or_manager, require_role, AuthUser, Role};
use crate::error::{not_found_error, ApiResult};
use crate::lifecycle;
use crate::models::{
    ActivityFilter, LeadFilter, Listing, PageRequest, SuccessResponse, UpdateRoleRequest,
    UpdateStatusRequest, UpdateUserRequest, User, UserFilter, UserQuery, UserStats,
};
use crate::state::SharedState;
use axum::{extract::State, Extension, Json};
use tracing::info;
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 10;

fn user_not_found() -> crate::error::AppError {
    not_found_error("User not found")
}

/// GET /api/users
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppQuery(query): AppQuery<UserQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<User>>>> {
    require_role(&caller, &[Role::Admin, Role::Manager])?;

    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let users = state.store.list_users(&UserFilter::from(&query), page).await?;

    Ok(Json(SuccessResponse::new(Listing::new("users", users, page))))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    ensure_self_or_manager(&caller, id)?;

    let user = state.store.find_user(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(SuccessResponse::new(user)))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    ensure_self_or_manager(&caller, id)?;

    let user = state
        .store
        .update_user(id, &req)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(SuccessResponse::with_data("User updated successfully", user)))
}

/// PATCH /api/users/{id}/role
pub async fn update_role(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateRoleRequest>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    require_role(&caller, &[Role::Admin])?;

    let user = state
        .store
        .set_user_role(id, req.role)
        .await?
        .ok_or_else(user_not_found)?;
    info!("Role of {} set to {} by {}", user.email, user.role, caller.email);

    Ok(Json(SuccessResponse::with_data("User role updated successfully", user)))
}

/// PATCH /api/users/{id}/status
pub async fn update_status(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateStatusRequest>,
) -> ApiResult<Json<SuccessResponse<User>>> {
    require_role(&caller, &[Role::Admin, Role::Manager])?;

    let user = state
        .store
        .set_user_active(id, req.is_active)
        .await?
        .ok_or_else(user_not_found)?;

    let verb = if user.is_active { "activated" } else { "deactivated" };
    info!("User {} {} by {}", user.email, verb, caller.email);

    Ok(Json(SuccessResponse::with_data(
        format!("User {} successfully", verb),
        user,
    )))
}

/// GET /api/users/{id}/stats
pub async fn user_stats(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<SuccessResponse<UserStats>>> {
    ensure_self_or_manager(&caller, id)?;

    let leads_count = state
        .store
        .count_leads(&LeadFilter {
            assigned_to: Some(id),
            ..Default::default()
        })
        .await?;
    let activities_count = state
        .store
        .count_activities(&ActivityFilter {
            user_id: Some(id),
            ..Default::default()
        })
        .await?;
    let aggregates = state.store.stage_aggregates(Some(id)).await?;

    Ok(Json(SuccessResponse::new(lifecycle::user_stats(
        &aggregates,
        leads_count,
        activities_count,
    ))))
}
