//! Deal route handlers
//!
//! Lead status changes that follow a deal (promotion on create, stage sync on
//! update, reset on delete) happen inside the store call.

use super::extract::{AppPath, AppQuery, ValidJson};
use super::relations;
use crate::auth::AuthUser;
use crate::error::{not_found_error, ApiResult};
use crate::lifecycle;
use crate::models::{
    ActivityFilter, CreateDealRequest, DealDetail, DealFilter, DealListItem, DealQuery, DealStats,
    DealView, Listing, MessageResponse, NewDeal, PageRequest, PipelineStage, SuccessResponse,
    TaskFilter, UpdateDealRequest,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 10;

/// GET /api/deals
///
/// Each deal carries its lead, owner, latest activities and open tasks.
pub async fn list_deals(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<DealQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<DealListItem>>>> {
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let (deals, total) = state.store.list_deals(&DealFilter::from(&query), page).await?;
    let items = relations::deal_list_items(state.store.as_ref(), deals).await?;

    Ok(Json(SuccessResponse::new(Listing::new("deals", (items, total), page))))
}

/// GET /api/deals/pipeline/overview
pub async fn pipeline_overview(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<PipelineStage>>>> {
    let aggregates = state.store.stage_aggregates(None).await?;
    Ok(Json(SuccessResponse::new(lifecycle::pipeline_overview(&aggregates))))
}

/// GET /api/deals/stats/overview
pub async fn deal_stats(State(state): State<SharedState>) -> ApiResult<Json<SuccessResponse<DealStats>>> {
    let aggregates = state.store.stage_aggregates(None).await?;
    Ok(Json(SuccessResponse::new(lifecycle::deal_stats(&aggregates))))
}

/// GET /api/deals/{id}
pub async fn get_deal(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<SuccessResponse<DealDetail>>> {
    let deal = state
        .store
        .find_deal(id)
        .await?
        .ok_or_else(|| not_found_error("Deal not found"))?;

    let lead = state.store.find_lead(deal.lead_id).await?;
    let (activities, _) = state
        .store
        .list_activities(
            &ActivityFilter {
                deal_id: Some(id),
                ..Default::default()
            },
            PageRequest::unbounded(),
        )
        .await?;
    let (tasks, _) = state
        .store
        .list_tasks(
            &TaskFilter {
                deal_id: Some(id),
                ..Default::default()
            },
            PageRequest::unbounded(),
        )
        .await?;

    Ok(Json(SuccessResponse::new(DealDetail {
        deal,
        lead,
        activities,
        tasks,
    })))
}

/// POST /api/deals
pub async fn create_deal(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateDealRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<DealView>>)> {
    let deal = state
        .store
        .create_deal(NewDeal::from_request(req, caller.id))
        .await?;
    info!("Deal {} opened for lead {}", deal.id, deal.lead_id);
    let view = relations::deal_view(state.store.as_ref(), deal).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Deal created successfully", view)),
    ))
}

/// PUT /api/deals/{id}
pub async fn update_deal(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(req): ValidJson<UpdateDealRequest>,
) -> ApiResult<Json<SuccessResponse<DealView>>> {
    let changes = lifecycle::apply_stage_rules(req, Utc::now());
    let deal = state
        .store
        .update_deal(id, changes)
        .await?
        .ok_or_else(|| not_found_error("Deal not found"))?;
    let view = relations::deal_view(state.store.as_ref(), deal).await?;

    Ok(Json(SuccessResponse::with_data("Deal updated successfully", view)))
}

/// DELETE /api/deals/{id}
pub async fn delete_deal(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.store.delete_deal(id).await? {
        return Err(not_found_error("Deal not found"));
    }
    info!("Deal {} deleted", id);

    Ok(Json(MessageResponse::new("Deal deleted successfully")))
}
