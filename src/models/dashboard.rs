//! Dashboard response models

use super::{ActivityItem, BookingItem, TaskItem};
use serde::Serialize;

/// Headline counts for the calling user
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_leads: u64,
    pub new_leads_this_month: u64,
    pub total_deals: u64,
    pub active_deals: u64,
    /// CLOSED_WON value closed since the start of the month
    pub monthly_revenue: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub upcoming_bookings: Vec<BookingItem>,
    pub pending_tasks: Vec<TaskItem>,
    pub recent_activities: Vec<ActivityItem>,
}

/// Won revenue for one calendar month, `month` formatted as `YYYY-MM`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePoint {
    pub month: String,
    pub revenue: f64,
    pub deals: u64,
}
