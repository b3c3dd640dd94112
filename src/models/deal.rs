//! Deal models

use super::{
    deserialize_number, deserialize_optional_number, validate_not_blank, Activity, Lead, Task,
};
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Pipeline stage of a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "deal_stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStage {
    #[default]
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    /// Pipeline order used for reporting
    pub const PIPELINE: [DealStage; 5] = [
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub value: f64,
    pub stage: DealStage,
    pub probability: i32,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub actual_close_date: Option<DateTime<Utc>>,
    pub lead_id: Uuid,
    pub assigned_to_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A deal with its lead, activities and tasks
#[derive(Debug, Serialize)]
pub struct DealDetail {
    #[serde(flatten)]
    pub deal: Deal,
    pub lead: Option<Lead>,
    pub activities: Vec<Activity>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub lead_id: Uuid,
    #[serde(deserialize_with = "deserialize_number")]
    pub value: f64,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0, max = 100, message = "Probability must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Values for a deal row about to be inserted
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub title: String,
    pub description: Option<String>,
    pub value: f64,
    pub stage: DealStage,
    pub probability: i32,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub lead_id: Uuid,
    pub assigned_to_id: Uuid,
}

impl NewDeal {
    /// Deals are always assigned to the user who opens them
    pub fn from_request(req: CreateDealRequest, assigned_to_id: Uuid) -> Self {
        Self {
            title: req.title,
            description: req.description,
            value: req.value,
            stage: req.stage.unwrap_or_default(),
            probability: req.probability.unwrap_or(0),
            expected_close_date: req.expected_close_date,
            lead_id: req.lead_id,
            assigned_to_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub value: Option<f64>,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0, max = 100, message = "Probability must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub actual_close_date: Option<DateTime<Utc>>,
}

/// A deal update after the stage rules have been applied.
///
/// Built by [`crate::lifecycle::apply_stage_rules`]; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub actual_close_date: Option<DateTime<Utc>>,
}

impl DealChanges {
    pub fn apply(&self, deal: &mut Deal) {
        if let Some(v) = &self.title {
            deal.title = v.clone();
        }
        if let Some(v) = &self.description {
            deal.description = Some(v.clone());
        }
        if let Some(v) = self.value {
            deal.value = v;
        }
        if let Some(v) = self.stage {
            deal.stage = v;
        }
        if let Some(v) = self.probability {
            deal.probability = v;
        }
        if let Some(v) = self.expected_close_date {
            deal.expected_close_date = Some(v);
        }
        if let Some(v) = self.actual_close_date {
            deal.actual_close_date = Some(v);
        }
    }
}

/// Query string of `GET /api/deals`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub stage: Option<DealStage>,
    pub assigned_to: Option<Uuid>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub stage: Option<DealStage>,
    pub assigned_to: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl DealFilter {
    pub fn matches(&self, deal: &Deal) -> bool {
        self.stage.map_or(true, |s| deal.stage == s)
            && self.assigned_to.map_or(true, |u| deal.assigned_to_id == u)
            && self.lead_id.map_or(true, |l| deal.lead_id == l)
            && self.min_value.map_or(true, |min| deal.value >= min)
            && self.max_value.map_or(true, |max| deal.value <= max)
    }
}

impl From<&DealQuery> for DealFilter {
    fn from(query: &DealQuery) -> Self {
        Self {
            stage: query.stage,
            assigned_to: query.assigned_to,
            lead_id: None,
            min_value: query.min_value,
            max_value: query.max_value,
        }
    }
}

/// Per-stage totals as reported by the datastore
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageAggregate {
    pub stage: DealStage,
    pub count: u64,
    pub total_value: f64,
    pub avg_probability: f64,
}

/// One row of the pipeline overview
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub stage: DealStage,
    pub count: u64,
    pub total_value: f64,
    pub avg_probability: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub total_deals: u64,
    pub active_deals: u64,
    pub won_deals: u64,
    pub lost_deals: u64,
    pub total_value: f64,
    pub avg_deal_size: f64,
    pub win_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_update_rejects_blank_title() {
        let req: UpdateDealRequest = serde_json::from_str(r#"{"title": "   "}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));

        let req: UpdateDealRequest = serde_json::from_str(r#"{"stage": "PROPOSAL"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_accepts_numeric_string_value() {
        let lead_id = Uuid::new_v4();
        let body = format!(r#"{{"title": "Renewal", "leadId": "{}", "value": "12500.50"}}"#, lead_id);
        let req: CreateDealRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(req.value, 12500.5);

        let body = format!(r#"{{"title": "Renewal", "leadId": "{}", "value": "lots"}}"#, lead_id);
        assert!(serde_json::from_str::<CreateDealRequest>(&body).is_err());
    }
}
