//! Lead models

use super::{deserialize_optional_number, validate_not_blank, Activity, Deal, PHONE_RE};
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Where a lead sits in the sales process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "lead_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    ProposalSent,
    Negotiation,
    ClosedWon,
    ClosedLost,
    OnHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "lead_source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadSource {
    Website,
    Referral,
    SocialMedia,
    EmailCampaign,
    ColdCall,
    TradeShow,
    Partner,
    #[default]
    Manual,
    Import,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub score: i32,
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
    pub created_by_id: Uuid,
    pub assigned_to_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lead together with its deal and activity history
#[derive(Debug, Serialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub deal: Option<Deal>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub last_name: String,
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Option<LeadSource>,
    pub assigned_to_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate(range(min = 0.0, message = "Estimated value must not be negative"))]
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub estimated_value: Option<f64>,
}

/// Values for a lead row about to be inserted
#[derive(Debug, Clone)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: LeadSource,
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
    pub created_by_id: Uuid,
    pub assigned_to_id: Uuid,
}

impl NewLead {
    /// The creator owns the lead unless another assignee is named
    pub fn from_request(req: CreateLeadRequest, created_by_id: Uuid) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            job_title: req.job_title,
            source: req.source.unwrap_or_default(),
            estimated_value: req.estimated_value,
            notes: req.notes,
            created_by_id,
            assigned_to_id: req.assigned_to_id.unwrap_or(created_by_id),
        }
    }
}

/// Partial lead update; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Valid email is required"))]
    pub email: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub assigned_to_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate(range(min = 0.0, message = "Estimated value must not be negative"))]
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub estimated_value: Option<f64>,
}

impl UpdateLeadRequest {
    pub fn apply(&self, lead: &mut Lead) {
        if let Some(v) = &self.first_name {
            lead.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            lead.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            lead.email = v.clone();
        }
        if let Some(v) = &self.phone {
            lead.phone = Some(v.clone());
        }
        if let Some(v) = &self.company {
            lead.company = Some(v.clone());
        }
        if let Some(v) = &self.job_title {
            lead.job_title = Some(v.clone());
        }
        if let Some(v) = self.source {
            lead.source = v;
        }
        if let Some(v) = self.status {
            lead.status = v;
        }
        if let Some(v) = self.assigned_to_id {
            lead.assigned_to_id = v;
        }
        if let Some(v) = &self.notes {
            lead.notes = Some(v.clone());
        }
        if let Some(v) = self.estimated_value {
            lead.estimated_value = Some(v);
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateScoreRequest {
    #[validate(range(min = 0, max = 100, message = "Score must be between 0 and 100"))]
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: i32,
}

/// Query string of `GET /api/leads`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub assigned_to: Option<Uuid>,
    /// Case-insensitive substring over first name, last name, email and company
    pub search: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        if self.status.is_some_and(|s| lead.status != s)
            || self.source.is_some_and(|s| lead.source != s)
            || self.assigned_to.is_some_and(|u| lead.assigned_to_id != u)
            || self.created_since.is_some_and(|t| lead.created_at < t)
        {
            return false;
        }

        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                [
                    Some(&lead.first_name),
                    Some(&lead.last_name),
                    Some(&lead.email),
                    lead.company.as_ref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

impl From<&LeadQuery> for LeadFilter {
    fn from(query: &LeadQuery) -> Self {
        Self {
            status: query.status,
            source: query.source,
            assigned_to: query.assigned_to,
            search: query.search.clone().filter(|s| !s.trim().is_empty()),
            created_since: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total_leads: u64,
    pub new_leads: u64,
    pub qualified_leads: u64,
    pub closed_won_leads: u64,
    pub closed_lost_leads: u64,
    pub conversion_rate: f64,
}
