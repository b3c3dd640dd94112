//! In-memory datastore
//!
//! Backs development runs without `DATABASE_URL` and the test suite. All
//! tables live behind one lock, so every call (cascades included) is atomic.

use super::store::{CrmStore, Page, MISSING_REFERENCE};
use crate::auth::Role;
use crate::error::AppError;
use crate::lifecycle::{lead_status_for_stage, lead_status_on_deal_created, lead_status_on_deal_deleted};
use crate::models::{
    paginate, Activity, ActivityFilter, Booking, BookingFilter, BookingStatus, Deal, DealChanges,
    DealFilter, DealStage, Lead, LeadFilter, LeadStatus, NewActivity, NewBooking, NewDeal, NewLead,
    NewTask, NewUser, PageRequest, StageAggregate, Task, TaskChanges, TaskFilter, TaskStatus,
    UpdateLeadRequest, UpdateUserRequest, User, UserFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    leads: HashMap<Uuid, Lead>,
    deals: HashMap<Uuid, Deal>,
    activities: HashMap<Uuid, Activity>,
    tasks: HashMap<Uuid, Task>,
    bookings: HashMap<Uuid, Booking>,
}

impl Tables {
    fn check_user(&self, id: Uuid) -> Result<(), AppError> {
        check(self.users.contains_key(&id))
    }

    fn check_lead(&self, id: Option<Uuid>) -> Result<(), AppError> {
        check(id.map_or(true, |id| self.leads.contains_key(&id)))
    }

    fn check_deal(&self, id: Option<Uuid>) -> Result<(), AppError> {
        check(id.map_or(true, |id| self.deals.contains_key(&id)))
    }

    /// Remove a deal and detach the rows pointing at it
    fn drop_deal(&mut self, id: Uuid) -> Option<Deal> {
        let deal = self.deals.remove(&id)?;
        for task in self.tasks.values_mut().filter(|t| t.deal_id == Some(id)) {
            task.deal_id = None;
        }
        for activity in self.activities.values_mut().filter(|a| a.deal_id == Some(id)) {
            activity.deal_id = None;
        }
        Some(deal)
    }
}

fn check(exists: bool) -> Result<(), AppError> {
    if exists {
        Ok(())
    } else {
        Err(AppError::BadRequest(MISSING_REFERENCE.to_string()))
    }
}

/// Datastore keeping every table in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::BadRequest("User already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: true,
            avatar: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, AppError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().filter(|u| filter.matches(u)).cloned().collect();
        users.sort_by_key(|u| Reverse(u.created_at));
        Ok(paginate(users, page))
    }

    async fn update_user(&self, id: Uuid, changes: &UpdateUserRequest) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &changes.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &changes.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &changes.avatar {
            user.avatar = Some(v.clone());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.is_active = active;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .users
            .get_mut(&id)
            .map(|user| {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn list_leads(&self, filter: &LeadFilter, page: PageRequest) -> Result<Page<Lead>, AppError> {
        let tables = self.tables.read().await;
        let mut leads: Vec<Lead> = tables.leads.values().filter(|l| filter.matches(l)).cloned().collect();
        leads.sort_by_key(|l| Reverse(l.created_at));
        Ok(paginate(leads, page))
    }

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.leads.values().filter(|l| filter.matches(l)).count() as u64)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.tables.read().await.leads.get(&id).cloned())
    }

    async fn create_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user(lead.created_by_id)?;
        tables.check_user(lead.assigned_to_id)?;

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            first_name: lead.first_name,
            last_name: lead.last_name,
            email: lead.email,
            phone: lead.phone,
            company: lead.company,
            job_title: lead.job_title,
            source: lead.source,
            status: LeadStatus::default(),
            score: 0,
            estimated_value: lead.estimated_value,
            notes: lead.notes,
            created_by_id: lead.created_by_id,
            assigned_to_id: lead.assigned_to_id,
            created_at: now,
            updated_at: now,
        };
        tables.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn update_lead(&self, id: Uuid, changes: &UpdateLeadRequest) -> Result<Option<Lead>, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(assignee) = changes.assigned_to_id {
            if tables.leads.contains_key(&id) {
                tables.check_user(assignee)?;
            }
        }
        Ok(tables.leads.get_mut(&id).map(|lead| {
            changes.apply(lead);
            lead.updated_at = Utc::now();
            lead.clone()
        }))
    }

    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.leads.remove(&id).is_none() {
            return Ok(false);
        }

        let deal_ids: Vec<Uuid> = tables
            .deals
            .values()
            .filter(|d| d.lead_id == id)
            .map(|d| d.id)
            .collect();
        for deal_id in deal_ids {
            tables.drop_deal(deal_id);
        }
        for activity in tables.activities.values_mut().filter(|a| a.lead_id == Some(id)) {
            activity.lead_id = None;
        }
        for booking in tables.bookings.values_mut().filter(|b| b.lead_id == Some(id)) {
            booking.lead_id = None;
        }

        debug!("Deleted lead {} with its deal", id);
        Ok(true)
    }

    async fn set_lead_score(&self, id: Uuid, score: i32) -> Result<Option<Lead>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.leads.get_mut(&id).map(|lead| {
            lead.score = score;
            lead.updated_at = Utc::now();
            lead.clone()
        }))
    }

    async fn lead_status_counts(&self) -> Result<HashMap<LeadStatus, u64>, AppError> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for lead in tables.leads.values() {
            *counts.entry(lead.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_deals(&self, filter: &DealFilter, page: PageRequest) -> Result<Page<Deal>, AppError> {
        let tables = self.tables.read().await;
        let mut deals: Vec<Deal> = tables.deals.values().filter(|d| filter.matches(d)).cloned().collect();
        deals.sort_by_key(|d| Reverse(d.created_at));
        Ok(paginate(deals, page))
    }

    async fn find_deal(&self, id: Uuid) -> Result<Option<Deal>, AppError> {
        Ok(self.tables.read().await.deals.get(&id).cloned())
    }

    async fn find_deal_by_lead(&self, lead_id: Uuid) -> Result<Option<Deal>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.deals.values().find(|d| d.lead_id == lead_id).cloned())
    }

    async fn create_deal(&self, deal: NewDeal) -> Result<Deal, AppError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let lead = tables
            .leads
            .get_mut(&deal.lead_id)
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;
        if tables.deals.values().any(|d| d.lead_id == lead.id) {
            return Err(AppError::BadRequest("Lead already has an associated deal".to_string()));
        }
        check(tables.users.contains_key(&deal.assigned_to_id))?;

        let now = Utc::now();
        if let Some(status) = lead_status_on_deal_created(lead.status) {
            debug!("Lead {} promoted from {:?} to {:?}", lead.id, lead.status, status);
            lead.status = status;
            lead.updated_at = now;
        }

        let deal = Deal {
            id: Uuid::new_v4(),
            title: deal.title,
            description: deal.description,
            value: deal.value,
            stage: deal.stage,
            probability: deal.probability,
            expected_close_date: deal.expected_close_date,
            actual_close_date: None,
            lead_id: deal.lead_id,
            assigned_to_id: deal.assigned_to_id,
            created_at: now,
            updated_at: now,
        };
        tables.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn update_deal(&self, id: Uuid, changes: DealChanges) -> Result<Option<Deal>, AppError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let Some(deal) = tables.deals.get_mut(&id) else {
            return Ok(None);
        };
        let now = Utc::now();
        changes.apply(deal);
        deal.updated_at = now;

        if let Some(stage) = changes.stage {
            if let Some(lead) = tables.leads.get_mut(&deal.lead_id) {
                lead.status = lead_status_for_stage(stage);
                lead.updated_at = now;
            }
        }
        Ok(Some(deal.clone()))
    }

    async fn delete_deal(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(deal) = tables.drop_deal(id) else {
            return Ok(false);
        };
        if let Some(lead) = tables.leads.get_mut(&deal.lead_id) {
            lead.status = lead_status_on_deal_deleted();
            lead.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn stage_aggregates(&self, assigned_to: Option<Uuid>) -> Result<Vec<StageAggregate>, AppError> {
        let tables = self.tables.read().await;
        let mut sums: HashMap<DealStage, (u64, f64, i64)> = HashMap::new();
        for deal in tables
            .deals
            .values()
            .filter(|d| assigned_to.map_or(true, |u| d.assigned_to_id == u))
        {
            let entry = sums.entry(deal.stage).or_insert((0, 0.0, 0));
            entry.0 += 1;
            entry.1 += deal.value;
            entry.2 += deal.probability as i64;
        }

        Ok(DealStage::PIPELINE
            .iter()
            .filter_map(|stage| {
                sums.get(stage).map(|&(count, total_value, probability)| StageAggregate {
                    stage: *stage,
                    count,
                    total_value,
                    avg_probability: probability as f64 / count as f64,
                })
            })
            .collect())
    }

    async fn closed_won_deals(&self, assigned_to: Uuid, since: DateTime<Utc>) -> Result<Vec<Deal>, AppError> {
        let tables = self.tables.read().await;
        let mut deals: Vec<Deal> = tables
            .deals
            .values()
            .filter(|d| {
                d.assigned_to_id == assigned_to
                    && d.stage == DealStage::ClosedWon
                    && d.actual_close_date.is_some_and(|closed| closed >= since)
            })
            .cloned()
            .collect();
        deals.sort_by_key(|d| d.actual_close_date);
        Ok(deals)
    }

    async fn list_activities(&self, filter: &ActivityFilter, page: PageRequest) -> Result<Page<Activity>, AppError> {
        let tables = self.tables.read().await;
        let mut activities: Vec<Activity> = tables
            .activities
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        activities.sort_by_key(|a| Reverse(a.created_at));
        Ok(paginate(activities, page))
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.activities.values().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user(activity.user_id)?;
        tables.check_lead(activity.lead_id)?;
        tables.check_deal(activity.deal_id)?;

        let activity = Activity {
            id: Uuid::new_v4(),
            activity_type: activity.activity_type,
            title: activity.title,
            description: activity.description,
            lead_id: activity.lead_id,
            deal_id: activity.deal_id,
            user_id: activity.user_id,
            scheduled_at: activity.scheduled_at,
            duration: activity.duration,
            created_at: Utc::now(),
        };
        tables.activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    async fn list_tasks(&self, filter: &TaskFilter, page: PageRequest) -> Result<Page<Task>, AppError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables.tasks.values().filter(|t| filter.matches(t)).cloned().collect();
        tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date, t.created_at));
        Ok(paginate(tasks, page))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user(task.assigned_to_id)?;
        tables.check_deal(task.deal_id)?;

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            status: TaskStatus::default(),
            priority: task.priority,
            due_date: task.due_date,
            completed_at: None,
            deal_id: task.deal_id,
            assigned_to_id: task.assigned_to_id,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(assignee) = changes.assigned_to_id {
            if tables.tasks.contains_key(&id) {
                tables.check_user(assignee)?;
            }
        }
        Ok(tables.tasks.get_mut(&id).map(|task| {
            changes.apply(task);
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn list_bookings(&self, filter: &BookingFilter, page: PageRequest) -> Result<Page<Booking>, AppError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(paginate(bookings, page))
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user(booking.user_id)?;
        tables.check_lead(booking.lead_id)?;

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            title: booking.title,
            description: booking.description,
            start_time: booking.start_time,
            end_time: booking.end_time,
            attendee_email: booking.attendee_email,
            attendee_name: booking.attendee_name,
            meeting_type: booking.meeting_type,
            status: BookingStatus::default(),
            user_id: booking.user_id,
            lead_id: booking.lead_id,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(pick(&tables.users, ids))
    }

    async fn leads_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Lead>, AppError> {
        let tables = self.tables.read().await;
        Ok(pick(&tables.leads, ids))
    }

    async fn deals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deal>, AppError> {
        let tables = self.tables.read().await;
        Ok(pick(&tables.deals, ids))
    }

    async fn deals_by_lead_ids(&self, lead_ids: &[Uuid]) -> Result<Vec<Deal>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .deals
            .values()
            .filter(|d| lead_ids.contains(&d.lead_id))
            .cloned()
            .collect())
    }
}

/// Rows for the given keys, skipping unknown ones
fn pick<T: Clone>(table: &HashMap<Uuid, T>, ids: &[Uuid]) -> Vec<T> {
    ids.iter().filter_map(|id| table.get(id).cloned()).collect()
}
