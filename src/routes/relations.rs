//! Embeds related records into response rows
//!
//! Lookups are batched per page: one query per related table, plus the
//! per-row activity and task previews.

use crate::db::CrmStore;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityFilter, ActivityItem, Booking, BookingItem, Deal, DealListItem, DealSummary,
    DealView, Lead, LeadListItem, LeadSummary, PageRequest, Task, TaskFilter, TaskItem,
    TaskStatus, UserSummary,
};
use std::collections::HashMap;
use uuid::Uuid;

const DEAL_ACTIVITIES: u32 = 3;
const DEAL_OPEN_TASKS: u32 = 3;
const LEAD_ACTIVITIES: u32 = 5;

fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn users(
    store: &dyn CrmStore,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, UserSummary>, AppError> {
    let found = store.users_by_ids(&distinct(ids)).await?;
    Ok(found.iter().map(|u| (u.id, UserSummary::from(u))).collect())
}

async fn leads(
    store: &dyn CrmStore,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, LeadSummary>, AppError> {
    let found = store.leads_by_ids(&distinct(ids)).await?;
    Ok(found.iter().map(|l| (l.id, LeadSummary::from(l))).collect())
}

async fn deals(
    store: &dyn CrmStore,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, DealSummary>, AppError> {
    let found = store.deals_by_ids(&distinct(ids)).await?;
    Ok(found.iter().map(|d| (d.id, DealSummary::from(d))).collect())
}

fn lookup<T: Clone>(map: &HashMap<Uuid, T>, id: Option<Uuid>) -> Option<T> {
    id.and_then(|id| map.get(&id).cloned())
}

/// A single deal with its lead and owner
pub async fn deal_view(store: &dyn CrmStore, deal: Deal) -> Result<DealView, AppError> {
    let lead = store.find_lead(deal.lead_id).await?;
    let owner = store.find_user(deal.assigned_to_id).await?;

    Ok(DealView {
        lead: lead.as_ref().map(LeadSummary::from),
        assigned_to: owner.as_ref().map(UserSummary::from),
        deal,
    })
}

/// Deal rows with lead, owner, latest activities and open tasks
pub async fn deal_list_items(store: &dyn CrmStore, page: Vec<Deal>) -> Result<Vec<DealListItem>, AppError> {
    let lead_map = leads(store, page.iter().map(|d| d.lead_id)).await?;
    let user_map = users(store, page.iter().map(|d| d.assigned_to_id)).await?;

    let mut items = Vec::with_capacity(page.len());
    for deal in page {
        let (activities, _) = store
            .list_activities(
                &ActivityFilter {
                    deal_id: Some(deal.id),
                    ..Default::default()
                },
                PageRequest::first(DEAL_ACTIVITIES),
            )
            .await?;
        let (tasks, _) = store
            .list_tasks(
                &TaskFilter {
                    statuses: TaskStatus::OPEN.to_vec(),
                    deal_id: Some(deal.id),
                    ..Default::default()
                },
                PageRequest::first(DEAL_OPEN_TASKS),
            )
            .await?;

        items.push(DealListItem {
            view: DealView {
                lead: lookup(&lead_map, Some(deal.lead_id)),
                assigned_to: lookup(&user_map, Some(deal.assigned_to_id)),
                deal,
            },
            activities,
            tasks,
        });
    }
    Ok(items)
}

/// Lead rows with creator, assignee, deal and latest activities
pub async fn lead_list_items(store: &dyn CrmStore, page: Vec<Lead>) -> Result<Vec<LeadListItem>, AppError> {
    let user_map = users(
        store,
        page.iter().flat_map(|l| [l.created_by_id, l.assigned_to_id]),
    )
    .await?;
    let mut deal_map: HashMap<Uuid, Deal> = store
        .deals_by_lead_ids(&distinct(page.iter().map(|l| l.id)))
        .await?
        .into_iter()
        .map(|d| (d.lead_id, d))
        .collect();

    let mut items = Vec::with_capacity(page.len());
    for lead in page {
        let (activities, _) = store
            .list_activities(
                &ActivityFilter {
                    lead_id: Some(lead.id),
                    ..Default::default()
                },
                PageRequest::first(LEAD_ACTIVITIES),
            )
            .await?;

        items.push(LeadListItem {
            created_by: lookup(&user_map, Some(lead.created_by_id)),
            assigned_to: lookup(&user_map, Some(lead.assigned_to_id)),
            deal: deal_map.remove(&lead.id),
            activities,
            lead,
        });
    }
    Ok(items)
}

pub async fn activity_items(store: &dyn CrmStore, page: Vec<Activity>) -> Result<Vec<ActivityItem>, AppError> {
    let user_map = users(store, page.iter().map(|a| a.user_id)).await?;
    let lead_map = leads(store, page.iter().filter_map(|a| a.lead_id)).await?;
    let deal_map = deals(store, page.iter().filter_map(|a| a.deal_id)).await?;

    Ok(page
        .into_iter()
        .map(|activity| ActivityItem {
            user: lookup(&user_map, Some(activity.user_id)),
            lead: lookup(&lead_map, activity.lead_id),
            deal: lookup(&deal_map, activity.deal_id),
            activity,
        })
        .collect())
}

pub async fn task_items(store: &dyn CrmStore, page: Vec<Task>) -> Result<Vec<TaskItem>, AppError> {
    let user_map = users(store, page.iter().map(|t| t.assigned_to_id)).await?;
    let deal_map = deals(store, page.iter().filter_map(|t| t.deal_id)).await?;

    Ok(page
        .into_iter()
        .map(|task| TaskItem {
            assigned_to: lookup(&user_map, Some(task.assigned_to_id)),
            deal: lookup(&deal_map, task.deal_id),
            task,
        })
        .collect())
}

pub async fn booking_items(store: &dyn CrmStore, page: Vec<Booking>) -> Result<Vec<BookingItem>, AppError> {
    let user_map = users(store, page.iter().map(|b| b.user_id)).await?;
    let lead_map = leads(store, page.iter().filter_map(|b| b.lead_id)).await?;

    Ok(page
        .into_iter()
        .map(|booking| BookingItem {
            user: lookup(&user_map, Some(booking.user_id)),
            lead: lookup(&lead_map, booking.lead_id),
            booking,
        })
        .collect())
}
