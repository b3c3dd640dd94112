//! Lead route handlers

use super::extract::{AppPath, AppQuery, ValidJson};
use super::relations;
use crate::auth::AuthUser;
use crate::error::{not_found_error, ApiResult};
use crate::lifecycle;
use crate::models::{
    ActivityFilter, CreateLeadRequest, Lead, LeadDetail, LeadFilter, LeadListItem, LeadQuery,
    LeadStats, Listing, MessageResponse, NewLead, PageRequest, ScoreResponse, SuccessResponse,
    UpdateLeadRequest, UpdateScoreRequest,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::info;
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 10;

/// GET /api/leads
pub async fn list_leads(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<LeadQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<LeadListItem>>>> {
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = LeadFilter::from(&query);
    let (leads, total) = state.store.list_leads(&filter, page).await?;
    let items = relations::lead_list_items(state.store.as_ref(), leads).await?;

    Ok(Json(SuccessResponse::new(Listing::new("leads", (items, total), page))))
}

/// GET /api/leads/stats/overview
pub async fn lead_stats(State(state): State<SharedState>) -> ApiResult<Json<SuccessResponse<LeadStats>>> {
    let counts = state.store.lead_status_counts().await?;
    Ok(Json(SuccessResponse::new(lifecycle::lead_stats(&counts))))
}

/// GET /api/leads/{id}
///
/// The lead with its deal and full activity history.
pub async fn get_lead(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<SuccessResponse<LeadDetail>>> {
    let lead = state
        .store
        .find_lead(id)
        .await?
        .ok_or_else(|| not_found_error("Lead not found"))?;

    let deal = state.store.find_deal_by_lead(id).await?;
    let activity_filter = ActivityFilter {
        lead_id: Some(id),
        ..Default::default()
    };
    let (activities, _) = state
        .store
        .list_activities(&activity_filter, PageRequest::unbounded())
        .await?;

    Ok(Json(SuccessResponse::new(LeadDetail {
        lead,
        deal,
        activities,
    })))
}

/// POST /api/leads
pub async fn create_lead(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateLeadRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Lead>>)> {
    let lead = state
        .store
        .create_lead(NewLead::from_request(req, caller.id))
        .await?;
    info!("Lead {} created by {}", lead.id, caller.email);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Lead created successfully", lead)),
    ))
}

/// PUT /api/leads/{id}
pub async fn update_lead(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(req): ValidJson<UpdateLeadRequest>,
) -> ApiResult<Json<SuccessResponse<Lead>>> {
    let lead = state
        .store
        .update_lead(id, &req)
        .await?
        .ok_or_else(|| not_found_error("Lead not found"))?;

    Ok(Json(SuccessResponse::with_data("Lead updated successfully", lead)))
}

/// DELETE /api/leads/{id}
pub async fn delete_lead(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.store.delete_lead(id).await? {
        return Err(not_found_error("Lead not found"));
    }
    info!("Lead {} deleted", id);

    Ok(Json(MessageResponse::new("Lead deleted successfully")))
}

/// PATCH /api/leads/{id}/score
pub async fn update_score(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(req): ValidJson<UpdateScoreRequest>,
) -> ApiResult<Json<SuccessResponse<ScoreResponse>>> {
    let lead = state
        .store
        .set_lead_score(id, req.score)
        .await?
        .ok_or_else(|| not_found_error("Lead not found"))?;

    Ok(Json(SuccessResponse::with_data(
        "Lead score updated successfully",
        ScoreResponse { score: lead.score },
    )))
}
