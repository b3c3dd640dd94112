//! Activity log models

use super::validate_not_blank;
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "activity_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Task,
    Note,
    ProposalSent,
    FollowUp,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub user_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Minutes
    pub duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub user_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
}

impl NewActivity {
    pub fn from_request(req: CreateActivityRequest, user_id: Uuid) -> Self {
        Self {
            activity_type: req.activity_type,
            title: req.title,
            description: req.description,
            lead_id: req.lead_id,
            deal_id: req.deal_id,
            user_id,
            scheduled_at: req.scheduled_at,
            duration: req.duration,
        }
    }
}

/// Query string of `GET /api/activities`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity) -> bool {
        self.activity_type.map_or(true, |t| activity.activity_type == t)
            && self.lead_id.map_or(true, |l| activity.lead_id == Some(l))
            && self.deal_id.map_or(true, |d| activity.deal_id == Some(d))
            && self.user_id.map_or(true, |u| activity.user_id == u)
    }
}

impl From<&ActivityQuery> for ActivityFilter {
    fn from(query: &ActivityQuery) -> Self {
        Self {
            activity_type: query.activity_type,
            lead_id: query.lead_id,
            deal_id: query.deal_id,
            user_id: None,
        }
    }
}
