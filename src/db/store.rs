//! Datastore abstraction
//!
//! Every route talks to the CRM data through [`CrmStore`]. Deal mutations
//! carry their lead cascade with them, so implementations must apply the
//! deal and the lead change together or not at all.

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityFilter, Booking, BookingFilter, Deal, DealChanges, DealFilter, Lead,
    LeadFilter, LeadStatus, NewActivity, NewBooking, NewDeal, NewLead, NewTask, NewUser,
    PageRequest, StageAggregate, Task, TaskChanges, TaskFilter, UpdateLeadRequest,
    UpdateUserRequest, User, UserFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Message used when a referenced row does not exist
pub const MISSING_REFERENCE: &str = "Referenced record does not exist";

/// A page of rows and the total number of matches
pub type Page<T> = (Vec<T>, u64);

#[async_trait]
pub trait CrmStore: Send + Sync {
    /// Short backend name reported by `/health`
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), AppError>;

    // ----- users -----

    /// Fails with 400 "User already exists" on a duplicate email
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Newest first
    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, AppError>;
    async fn update_user(&self, id: Uuid, changes: &UpdateUserRequest) -> Result<Option<User>, AppError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError>;
    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AppError>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    // ----- leads -----

    /// Newest first
    async fn list_leads(&self, filter: &LeadFilter, page: PageRequest) -> Result<Page<Lead>, AppError>;
    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError>;
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;
    async fn create_lead(&self, lead: NewLead) -> Result<Lead, AppError>;
    async fn update_lead(&self, id: Uuid, changes: &UpdateLeadRequest) -> Result<Option<Lead>, AppError>;
    /// Removes the lead's deal and detaches its activities and bookings
    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError>;
    async fn set_lead_score(&self, id: Uuid, score: i32) -> Result<Option<Lead>, AppError>;
    async fn lead_status_counts(&self) -> Result<HashMap<LeadStatus, u64>, AppError>;

    // ----- deals -----

    /// Newest first
    async fn list_deals(&self, filter: &DealFilter, page: PageRequest) -> Result<Page<Deal>, AppError>;
    async fn find_deal(&self, id: Uuid) -> Result<Option<Deal>, AppError>;
    async fn find_deal_by_lead(&self, lead_id: Uuid) -> Result<Option<Deal>, AppError>;
    /// Opens a deal and promotes its lead.
    ///
    /// 404 when the lead is missing, 400 when it already has a deal.
    async fn create_deal(&self, deal: NewDeal) -> Result<Deal, AppError>;
    /// Applies the changes and, when the stage moves, mirrors it onto the lead
    async fn update_deal(&self, id: Uuid, changes: DealChanges) -> Result<Option<Deal>, AppError>;
    /// Removes the deal and resets its lead to QUALIFIED
    async fn delete_deal(&self, id: Uuid) -> Result<bool, AppError>;
    /// Per-stage totals, optionally restricted to one assignee
    async fn stage_aggregates(&self, assigned_to: Option<Uuid>) -> Result<Vec<StageAggregate>, AppError>;
    /// Won deals of `assigned_to` closed at or after `since`, oldest first
    async fn closed_won_deals(&self, assigned_to: Uuid, since: DateTime<Utc>) -> Result<Vec<Deal>, AppError>;

    // ----- activities -----

    /// Newest first
    async fn list_activities(&self, filter: &ActivityFilter, page: PageRequest) -> Result<Page<Activity>, AppError>;
    async fn count_activities(&self, filter: &ActivityFilter) -> Result<u64, AppError>;
    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError>;

    // ----- tasks -----

    /// Earliest due date first, undated tasks last
    async fn list_tasks(&self, filter: &TaskFilter, page: PageRequest) -> Result<Page<Task>, AppError>;
    async fn create_task(&self, task: NewTask) -> Result<Task, AppError>;
    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>, AppError>;

    // ----- bookings -----

    /// Earliest start first
    async fn list_bookings(&self, filter: &BookingFilter, page: PageRequest) -> Result<Page<Booking>, AppError>;
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError>;

    // ----- relation lookups -----

    /// Users among `ids`; unknown ids are skipped
    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;
    async fn leads_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Lead>, AppError>;
    async fn deals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deal>, AppError>;
    /// Deals owned by any of `lead_ids`
    async fn deals_by_lead_ids(&self, lead_ids: &[Uuid]) -> Result<Vec<Deal>, AppError>;
}
