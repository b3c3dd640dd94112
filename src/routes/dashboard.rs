//! Dashboard route handlers
//!
//! Everything here is scoped to the calling user.

use super::relations;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::lifecycle;
use crate::models::{
    ActivityFilter, BookingFilter, BookingStatus, DashboardOverview, DashboardStats, LeadFilter,
    PageRequest, RevenuePoint, SuccessResponse, TaskFilter, TaskStatus,
};
use crate::state::SharedState;
use axum::{extract::State, Extension, Json};
use chrono::Utc;

const UPCOMING_BOOKINGS: u32 = 5;
const PENDING_TASKS: u32 = 5;
const RECENT_ACTIVITIES: u32 = 10;

/// GET /api/dashboard/overview
pub async fn overview(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Json<SuccessResponse<DashboardOverview>>> {
    let now = Utc::now();
    let month_start = lifecycle::start_of_month(now);
    let store = state.store.as_ref();

    let mine = LeadFilter {
        assigned_to: Some(caller.id),
        ..Default::default()
    };
    let total_leads = store.count_leads(&mine).await?;
    let new_leads_this_month = store
        .count_leads(&LeadFilter {
            created_since: Some(month_start),
            ..mine
        })
        .await?;

    let deals = lifecycle::deal_stats(&store.stage_aggregates(Some(caller.id)).await?);
    let monthly_revenue: f64 = store
        .closed_won_deals(caller.id, month_start)
        .await?
        .iter()
        .map(|d| d.value)
        .sum();

    let (upcoming_bookings, _) = store
        .list_bookings(
            &BookingFilter {
                statuses: BookingStatus::UPCOMING.to_vec(),
                user_id: Some(caller.id),
                starts_after: Some(now),
            },
            PageRequest::first(UPCOMING_BOOKINGS),
        )
        .await?;
    let (pending_tasks, _) = store
        .list_tasks(
            &TaskFilter {
                statuses: TaskStatus::OPEN.to_vec(),
                assigned_to: Some(caller.id),
                ..Default::default()
            },
            PageRequest::first(PENDING_TASKS),
        )
        .await?;
    let (recent_activities, _) = store
        .list_activities(
            &ActivityFilter {
                user_id: Some(caller.id),
                ..Default::default()
            },
            PageRequest::first(RECENT_ACTIVITIES),
        )
        .await?;

    let upcoming_bookings = relations::booking_items(store, upcoming_bookings).await?;
    let pending_tasks = relations::task_items(store, pending_tasks).await?;
    let recent_activities = relations::activity_items(store, recent_activities).await?;

    Ok(Json(SuccessResponse::new(DashboardOverview {
        stats: DashboardStats {
            total_leads,
            new_leads_this_month,
            total_deals: deals.total_deals,
            active_deals: deals.active_deals,
            monthly_revenue,
        },
        upcoming_bookings,
        pending_tasks,
        recent_activities,
    })))
}

/// GET /api/dashboard/revenue-chart
pub async fn revenue_chart(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Json<SuccessResponse<Vec<RevenuePoint>>>> {
    let now = Utc::now();
    let deals = state
        .store
        .closed_won_deals(caller.id, lifecycle::revenue_window_start(now))
        .await?;

    Ok(Json(SuccessResponse::new(lifecycle::revenue_by_month(&deals, now))))
}
