//! Related-record summaries embedded in list and mutation responses

use super::{Activity, Booking, Deal, Lead, Task, User};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: Option<String>,
}

impl From<&Lead> for LeadSummary {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id,
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            company: lead.company.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealSummary {
    pub id: Uuid,
    pub title: String,
}

impl From<&Deal> for DealSummary {
    fn from(deal: &Deal) -> Self {
        Self {
            id: deal.id,
            title: deal.title.clone(),
        }
    }
}

/// A deal with its lead and owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealView {
    #[serde(flatten)]
    pub deal: Deal,
    pub lead: Option<LeadSummary>,
    pub assigned_to: Option<UserSummary>,
}

/// One row of `GET /api/deals`
#[derive(Debug, Serialize)]
pub struct DealListItem {
    #[serde(flatten)]
    pub view: DealView,
    /// Latest activities, newest first
    pub activities: Vec<Activity>,
    /// Open tasks, earliest due first
    pub tasks: Vec<Task>,
}

/// One row of `GET /api/leads`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListItem {
    #[serde(flatten)]
    pub lead: Lead,
    pub created_by: Option<UserSummary>,
    pub assigned_to: Option<UserSummary>,
    pub deal: Option<Deal>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    #[serde(flatten)]
    pub activity: Activity,
    pub user: Option<UserSummary>,
    pub lead: Option<LeadSummary>,
    pub deal: Option<DealSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    #[serde(flatten)]
    pub task: Task,
    pub assigned_to: Option<UserSummary>,
    pub deal: Option<DealSummary>,
}

#[derive(Debug, Serialize)]
pub struct BookingItem {
    #[serde(flatten)]
    pub booking: Booking,
    pub user: Option<UserSummary>,
    pub lead: Option<LeadSummary>,
}
