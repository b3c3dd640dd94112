//! Deal and lead lifecycle rules
//!
//! Pure functions shared by every datastore: how a deal mutation moves its
//! parent lead, how closing a deal stamps its close date, when a task counts
//! as completed, and how per-stage totals roll up into reports.

use crate::models::{
    Deal, DealChanges, DealStage, DealStats, LeadStats, LeadStatus, PipelineStage, RevenuePoint,
    StageAggregate, TaskChanges, TaskStatus, UpdateDealRequest, UpdateTaskRequest, UserStats,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::collections::HashMap;

/// Calendar months covered by the revenue chart, current month included
pub const REVENUE_MONTHS: i32 = 6;

/// Status a lead moves to when a deal is opened for it, if any.
///
/// Only early-stage leads are promoted; anything past QUALIFIED keeps its status.
pub fn lead_status_on_deal_created(current: LeadStatus) -> Option<LeadStatus> {
    match current {
        LeadStatus::New | LeadStatus::Contacted => Some(LeadStatus::Qualified),
        _ => None,
    }
}

/// Lead status mirroring a deal stage
pub fn lead_status_for_stage(stage: DealStage) -> LeadStatus {
    match stage {
        DealStage::ClosedWon => LeadStatus::ClosedWon,
        DealStage::ClosedLost => LeadStatus::ClosedLost,
        DealStage::Negotiation => LeadStatus::Negotiation,
        DealStage::Proposal => LeadStatus::ProposalSent,
        DealStage::Qualification => LeadStatus::Qualified,
    }
}

/// A lead whose deal is removed goes back to QUALIFIED
pub fn lead_status_on_deal_deleted() -> LeadStatus {
    LeadStatus::Qualified
}

/// Resolve a deal update into the changes to persist.
///
/// Moving to a closed stage stamps `actual_close_date` with `now`, replacing
/// whatever the client sent.
pub fn apply_stage_rules(req: UpdateDealRequest, now: DateTime<Utc>) -> DealChanges {
    let actual_close_date = match req.stage {
        Some(stage) if stage.is_closed() => Some(now),
        _ => req.actual_close_date,
    };

    DealChanges {
        title: req.title,
        description: req.description,
        value: req.value,
        stage: req.stage,
        probability: req.probability,
        expected_close_date: req.expected_close_date,
        actual_close_date,
    }
}

/// Resolve a task update; `completed_at` is set only when the update completes the task
pub fn task_changes(req: UpdateTaskRequest, now: DateTime<Utc>) -> TaskChanges {
    let completed_at = (req.status == Some(TaskStatus::Completed)).then_some(now);

    TaskChanges {
        title: req.title,
        description: req.description,
        status: req.status,
        priority: req.priority,
        due_date: req.due_date,
        assigned_to_id: req.assigned_to_id,
        completed_at,
    }
}

/// One row per stage in pipeline order; stages without deals report zeros
pub fn pipeline_overview(aggregates: &[StageAggregate]) -> Vec<PipelineStage> {
    DealStage::PIPELINE
        .iter()
        .map(|&stage| {
            let agg = aggregates.iter().find(|a| a.stage == stage);
            PipelineStage {
                stage,
                count: agg.map_or(0, |a| a.count),
                total_value: agg.map_or(0.0, |a| a.total_value),
                avg_probability: agg.map_or(0.0, |a| a.avg_probability),
            }
        })
        .collect()
}

pub fn deal_stats(aggregates: &[StageAggregate]) -> DealStats {
    let count = |stage: DealStage| {
        aggregates
            .iter()
            .filter(|a| a.stage == stage)
            .map(|a| a.count)
            .sum::<u64>()
    };

    let total_deals: u64 = aggregates.iter().map(|a| a.count).sum();
    let all_value: f64 = aggregates.iter().map(|a| a.total_value).sum();
    let won_deals = count(DealStage::ClosedWon);
    let lost_deals = count(DealStage::ClosedLost);
    let active_deals =
        count(DealStage::Qualification) + count(DealStage::Proposal) + count(DealStage::Negotiation);
    let total_value = aggregates
        .iter()
        .filter(|a| a.stage == DealStage::ClosedWon)
        .map(|a| a.total_value)
        .sum();

    DealStats {
        total_deals,
        active_deals,
        won_deals,
        lost_deals,
        total_value,
        avg_deal_size: if total_deals > 0 {
            all_value / total_deals as f64
        } else {
            0.0
        },
        win_rate: round2(percentage(won_deals, won_deals + lost_deals)),
    }
}

pub fn lead_stats(counts: &HashMap<LeadStatus, u64>) -> LeadStats {
    let of = |status| counts.get(&status).copied().unwrap_or(0);
    let total_leads = counts.values().sum();
    let closed_won_leads = of(LeadStatus::ClosedWon);

    LeadStats {
        total_leads,
        new_leads: of(LeadStatus::New),
        qualified_leads: of(LeadStatus::Qualified),
        closed_won_leads,
        closed_lost_leads: of(LeadStatus::ClosedLost),
        conversion_rate: round2(percentage(closed_won_leads, total_leads)),
    }
}

/// Performance summary of one user from their deal aggregates.
///
/// The win rate is taken over every assigned deal and left unrounded.
pub fn user_stats(aggregates: &[StageAggregate], leads_count: u64, activities_count: u64) -> UserStats {
    let deals_count: u64 = aggregates.iter().map(|a| a.count).sum();
    let won = aggregates.iter().filter(|a| a.stage == DealStage::ClosedWon);
    let won_deals_count: u64 = won.clone().map(|a| a.count).sum();
    let total_deals_value: f64 = won.map(|a| a.total_value).sum();

    UserStats {
        leads_count,
        deals_count,
        won_deals_count,
        total_deals_value,
        activities_count,
        win_rate: percentage(won_deals_count, deals_count),
    }
}

/// `part / whole * 100`, or 0 for an empty whole
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn month_index(at: DateTime<Utc>) -> i32 {
    at.year() * 12 + at.month0() as i32
}

fn month_start(index: i32) -> DateTime<Utc> {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Midnight UTC on the first day of `now`'s month
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    month_start(month_index(now))
}

/// Earliest close date included in the revenue chart
pub fn revenue_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    month_start(month_index(now) - (REVENUE_MONTHS - 1))
}

/// Bucket won deals by the month they closed, oldest month first.
///
/// Every month in the window is present even when nothing closed in it.
pub fn revenue_by_month(deals: &[Deal], now: DateTime<Utc>) -> Vec<RevenuePoint> {
    let last = month_index(now);
    let first = last - (REVENUE_MONTHS - 1);

    let mut points: Vec<RevenuePoint> = (first..=last)
        .map(|idx| RevenuePoint {
            month: format!("{:04}-{:02}", idx.div_euclid(12), idx.rem_euclid(12) + 1),
            revenue: 0.0,
            deals: 0,
        })
        .collect();

    for deal in deals.iter().filter(|d| d.stage == DealStage::ClosedWon) {
        let Some(closed) = deal.actual_close_date else {
            continue;
        };
        let offset = month_index(closed) - first;
        if let Some(point) = usize::try_from(offset).ok().and_then(|i| points.get_mut(i)) {
            point.revenue += deal.value;
            point.deals += 1;
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn agg(stage: DealStage, count: u64, total_value: f64, avg_probability: f64) -> StageAggregate {
        StageAggregate {
            stage,
            count,
            total_value,
            avg_probability,
        }
    }

    fn won_deal(value: f64, closed: DateTime<Utc>) -> Deal {
        Deal {
            id: Uuid::new_v4(),
            title: "Renewal".into(),
            description: None,
            value,
            stage: DealStage::ClosedWon,
            probability: 100,
            expected_close_date: None,
            actual_close_date: Some(closed),
            lead_id: Uuid::new_v4(),
            assigned_to_id: Uuid::new_v4(),
            created_at: closed,
            updated_at: closed,
        }
    }

    #[test]
    fn test_only_early_leads_are_promoted_on_deal_creation() {
        assert_eq!(lead_status_on_deal_created(LeadStatus::New), Some(LeadStatus::Qualified));
        assert_eq!(
            lead_status_on_deal_created(LeadStatus::Contacted),
            Some(LeadStatus::Qualified)
        );
        for status in [
            LeadStatus::Qualified,
            LeadStatus::ProposalSent,
            LeadStatus::Negotiation,
            LeadStatus::ClosedWon,
            LeadStatus::ClosedLost,
            LeadStatus::OnHold,
        ] {
            assert_eq!(lead_status_on_deal_created(status), None);
        }
    }

    #[test]
    fn test_stage_to_lead_status_mapping() {
        let mapped: Vec<LeadStatus> = DealStage::PIPELINE
            .iter()
            .map(|&s| lead_status_for_stage(s))
            .collect();
        assert_eq!(
            mapped,
            vec![
                LeadStatus::Qualified,
                LeadStatus::ProposalSent,
                LeadStatus::Negotiation,
                LeadStatus::ClosedWon,
                LeadStatus::ClosedLost,
            ]
        );
    }

    #[test]
    fn test_closing_overrides_client_close_date() {
        let now = Utc::now();
        let client_date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        for stage in [DealStage::ClosedWon, DealStage::ClosedLost] {
            let changes = apply_stage_rules(
                UpdateDealRequest {
                    stage: Some(stage),
                    actual_close_date: Some(client_date),
                    ..Default::default()
                },
                now,
            );
            assert_eq!(changes.actual_close_date, Some(now));
        }
    }

    #[test]
    fn test_open_stage_keeps_client_close_date() {
        let now = Utc::now();
        let client_date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let changes = apply_stage_rules(
            UpdateDealRequest {
                stage: Some(DealStage::Negotiation),
                actual_close_date: Some(client_date),
                ..Default::default()
            },
            now,
        );
        assert_eq!(changes.actual_close_date, Some(client_date));

        let untouched = apply_stage_rules(UpdateDealRequest::default(), now);
        assert_eq!(untouched, DealChanges::default());
    }

    #[test]
    fn test_task_completion_rule() {
        let now = Utc::now();
        let done = task_changes(
            UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            now,
        );
        assert_eq!(done.completed_at, Some(now));

        let reopened = task_changes(
            UpdateTaskRequest {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
            now,
        );
        assert_eq!(reopened.completed_at, None);

        let retitled = task_changes(
            UpdateTaskRequest {
                title: Some("Renamed".into()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(retitled.completed_at, None);
    }

    #[test]
    fn test_pipeline_fills_missing_stages() {
        let overview = pipeline_overview(&[agg(DealStage::Negotiation, 2, 5000.0, 60.0)]);
        assert_eq!(overview.len(), 5);
        assert_eq!(overview[0].stage, DealStage::Qualification);
        assert_eq!(overview[0].count, 0);
        assert_eq!(
            overview[2],
            PipelineStage {
                stage: DealStage::Negotiation,
                count: 2,
                total_value: 5000.0,
                avg_probability: 60.0,
            }
        );
    }

    #[test]
    fn test_deal_stats() {
        let stats = deal_stats(&[
            agg(DealStage::Qualification, 1, 1000.0, 10.0),
            agg(DealStage::ClosedWon, 2, 3000.0, 100.0),
            agg(DealStage::ClosedLost, 1, 2000.0, 0.0),
        ]);
        assert_eq!(
            stats,
            DealStats {
                total_deals: 4,
                active_deals: 1,
                won_deals: 2,
                lost_deals: 1,
                total_value: 3000.0,
                avg_deal_size: 1500.0,
                win_rate: 66.67,
            }
        );
        assert_eq!(deal_stats(&[]).win_rate, 0.0);
    }

    #[test]
    fn test_user_stats_win_rate_over_all_deals() {
        let aggregates = [
            StageAggregate {
                stage: DealStage::ClosedWon,
                count: 1,
                total_value: 1200.0,
                avg_probability: 100.0,
            },
            StageAggregate {
                stage: DealStage::Proposal,
                count: 2,
                total_value: 800.0,
                avg_probability: 40.0,
            },
        ];
        let stats = user_stats(&aggregates, 7, 4);
        assert_eq!(stats.deals_count, 3);
        assert_eq!(stats.won_deals_count, 1);
        assert_eq!(stats.total_deals_value, 1200.0);
        assert_eq!(stats.leads_count, 7);
        assert!((stats.win_rate - 100.0 / 3.0).abs() < 1e-9);

        assert_eq!(user_stats(&[], 0, 0).win_rate, 0.0);
    }

    #[test]
    fn test_lead_conversion_rate() {
        let counts = HashMap::from([
            (LeadStatus::New, 4),
            (LeadStatus::ClosedWon, 1),
            (LeadStatus::Qualified, 1),
        ]);
        let stats = lead_stats(&counts);
        assert_eq!(stats.total_leads, 6);
        assert_eq!(stats.conversion_rate, 16.67);
        assert_eq!(lead_stats(&HashMap::new()).conversion_rate, 0.0);
    }

    #[test]
    fn test_revenue_buckets_by_month() {
        let now = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();
        assert_eq!(
            revenue_window_start(now),
            Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap()
        );

        let deals = vec![
            won_deal(100.0, Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()),
            won_deal(50.0, Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap()),
            won_deal(70.0, Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap()),
            // outside the window
            won_deal(999.0, Utc.with_ymd_and_hms(2025, 8, 31, 9, 0, 0).unwrap()),
        ];
        let points = revenue_by_month(&deals, now);
        let months: Vec<&str> = points.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(
            months,
            vec!["2025-09", "2025-10", "2025-11", "2025-12", "2026-01", "2026-02"]
        );
        assert_eq!(points[3].revenue, 70.0);
        assert_eq!(points[5].revenue, 150.0);
        assert_eq!(points[5].deals, 2);
        assert_eq!(points.iter().map(|p| p.deals).sum::<u64>(), 3);
    }
}
