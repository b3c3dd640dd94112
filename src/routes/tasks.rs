//! Task route handlers

use super::extract::{AppPath, AppQuery, ValidJson};
use super::relations;
use crate::auth::AuthUser;
use crate::error::{not_found_error, ApiResult};
use crate::lifecycle;
use crate::models::{
    CreateTaskRequest, Listing, NewTask, PageRequest, SuccessResponse, Task, TaskFilter, TaskItem,
    TaskQuery, UpdateTaskRequest,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 20;

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<TaskQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<TaskItem>>>> {
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let (tasks, total) = state.store.list_tasks(&TaskFilter::from(&query), page).await?;
    let items = relations::task_items(state.store.as_ref(), tasks).await?;

    Ok(Json(SuccessResponse::new(Listing::new("tasks", (items, total), page))))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Task>>)> {
    let task = state
        .store
        .create_task(NewTask::from_request(req, caller.id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Task created successfully", task)),
    ))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(req): ValidJson<UpdateTaskRequest>,
) -> ApiResult<Json<SuccessResponse<Task>>> {
    let changes = lifecycle::task_changes(req, Utc::now());
    let task = state
        .store
        .update_task(id, changes)
        .await?
        .ok_or_else(|| not_found_error("Task not found"))?;

    Ok(Json(SuccessResponse::with_data("Task updated successfully", task)))
}
