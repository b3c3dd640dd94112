//! Activity log route handlers

use super::extract::{AppQuery, ValidJson};
use super::relations;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{
    Activity, ActivityFilter, ActivityItem, ActivityQuery, CreateActivityRequest, Listing,
    NewActivity, PageRequest, SuccessResponse,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};

const DEFAULT_LIMIT: u32 = 20;

/// GET /api/activities
pub async fn list_activities(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<ActivityItem>>>> {
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let (activities, total) = state
        .store
        .list_activities(&ActivityFilter::from(&query), page)
        .await?;
    let items = relations::activity_items(state.store.as_ref(), activities).await?;

    Ok(Json(SuccessResponse::new(Listing::new("activities", (items, total), page))))
}

/// POST /api/activities
///
/// Logged against the caller; lead and deal links are optional.
pub async fn create_activity(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateActivityRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Activity>>)> {
    let activity = state
        .store
        .create_activity(NewActivity::from_request(req, caller.id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Activity created successfully", activity)),
    ))
}
