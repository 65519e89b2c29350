//! Cohort, lifecycle-stage and engagement-segment analysis.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::dataset::OrgDataset;
use crate::analytics::error::{AnalyticsError, AnalyticsResult};
use crate::analytics::predictive::money;
use crate::analytics::statistics::mean;
use crate::core::shared::enums::LeadStatus;
use crate::core::shared::models::Lead;

pub const MAX_PERIODS_TO_TRACK: usize = 52;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortPeriod {
    Week,
    #[default]
    Month,
    Quarter,
}

impl std::str::FromStr for CohortPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "quarter" | "quarterly" => Ok(Self::Quarter),
            _ => Err(format!("Unknown cohort period: {s}")),
        }
    }
}

impl CohortPeriod {
    /// Start of the period containing `at` (UTC midnight).
    pub fn start_of(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let start = match self {
            Self::Week => date
                .checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
                .unwrap_or(date),
            Self::Month => first_of_month(date.year(), date.month()),
            Self::Quarter => first_of_month(date.year(), (date.month() - 1) / 3 * 3 + 1),
        };
        Utc.from_utc_datetime(&start.and_time(chrono::NaiveTime::MIN))
    }

    /// `start` moved forward by `k` periods.
    pub fn advance(&self, start: DateTime<Utc>, k: usize) -> AnalyticsResult<DateTime<Utc>> {
        let advanced = match self {
            Self::Week => (k as u64)
                .checked_mul(7)
                .and_then(|days| start.checked_add_days(Days::new(days))),
            Self::Month => u32::try_from(k)
                .ok()
                .and_then(|m| start.checked_add_months(Months::new(m))),
            Self::Quarter => u32::try_from(k)
                .ok()
                .and_then(|q| q.checked_mul(3))
                .and_then(|m| start.checked_add_months(Months::new(m))),
        };
        advanced.ok_or_else(|| AnalyticsError::Internal(format!("Date overflow advancing {start}")))
    }

    pub fn label(&self, start: DateTime<Utc>) -> String {
        match self {
            Self::Week => start.format("%G-W%V").to_string(),
            Self::Month => start.format("%Y-%m").to_string(),
            Self::Quarter => format!("{}-Q{}", start.year(), (start.month() - 1) / 3 + 1),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortPeriodMetrics {
    pub period_index: usize,
    pub active_leads: usize,
    pub retention_rate: f64,
    /// Leads won by the end of this period, cumulative.
    pub conversions: usize,
    pub conversion_rate: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cohort {
    pub label: String,
    pub start: DateTime<Utc>,
    pub size: usize,
    pub periods: Vec<CohortPeriodMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortAnalysis {
    pub period: CohortPeriod,
    pub periods_to_track: usize,
    pub cohorts: Vec<Cohort>,
    /// Mean retention per period index across the cohorts that reached it.
    pub average_retention: Vec<f64>,
}

pub fn analyze_cohorts(
    dataset: &OrgDataset,
    period: CohortPeriod,
    periods_to_track: usize,
    now: DateTime<Utc>,
) -> AnalyticsResult<CohortAnalysis> {
    if !(1..=MAX_PERIODS_TO_TRACK).contains(&periods_to_track) {
        return Err(AnalyticsError::InvalidInput(format!(
            "periods_to_track must be between 1 and {MAX_PERIODS_TO_TRACK}, got {periods_to_track}"
        )));
    }

    let mut buckets: BTreeMap<DateTime<Utc>, Vec<&Lead>> = BTreeMap::new();
    for lead in &dataset.leads {
        buckets
            .entry(period.start_of(lead.created_at))
            .or_default()
            .push(lead);
    }
    let comms = dataset.communications_by_lead();

    let mut cohorts = Vec::with_capacity(buckets.len());
    let mut retention_sums = vec![0.0; periods_to_track];
    let mut retention_counts = vec![0usize; periods_to_track];

    for (start, members) in buckets {
        let size = members.len();
        let mut periods = Vec::new();

        for k in 0..periods_to_track {
            let window_start = period.advance(start, k)?;
            if window_start > now {
                break;
            }
            let window_end = period.advance(start, k + 1)?;
            let in_window = |at: DateTime<Utc>| at >= window_start && at < window_end;

            let active_leads = members
                .iter()
                .filter(|l| {
                    comms
                        .get(&l.id)
                        .is_some_and(|cs| cs.iter().any(|c| in_window(c.created_at)))
                })
                .count();
            let conversions = members
                .iter()
                .filter(|l| l.is_won() && l.updated_at < window_end)
                .count();
            let revenue = members
                .iter()
                .filter(|l| l.is_won() && in_window(l.updated_at))
                .filter_map(|l| l.value)
                .map(money)
                .sum::<f64>();

            let retention_rate = active_leads as f64 / size as f64;
            retention_sums[k] += retention_rate;
            retention_counts[k] += 1;

            periods.push(CohortPeriodMetrics {
                period_index: k,
                active_leads,
                retention_rate,
                conversions,
                conversion_rate: conversions as f64 / size as f64,
                revenue,
            });
        }

        cohorts.push(Cohort {
            label: period.label(start),
            start,
            size,
            periods,
        });
    }

    let average_retention = retention_sums
        .iter()
        .zip(&retention_counts)
        .take_while(|(_, c)| **c > 0)
        .map(|(s, &c)| s / c as f64)
        .collect();

    Ok(CohortAnalysis {
        period,
        periods_to_track,
        cohorts,
        average_retention,
    })
}

// ============================================================================
// Lifecycle stages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleStage {
    pub status: LeadStatus,
    pub count: usize,
    pub percentage: f64,
    pub average_days_in_stage: Option<f64>,
    pub conversion_estimate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleAnalysis {
    pub total_leads: usize,
    pub overall_win_rate: f64,
    pub stages: Vec<LifecycleStage>,
}

pub fn lifecycle_stage_analysis(dataset: &OrgDataset, now: DateTime<Utc>) -> LifecycleAnalysis {
    let total = dataset.leads.len();
    let won = dataset.leads.iter().filter(|l| l.is_won()).count();
    let closed = dataset.leads.iter().filter(|l| l.is_closed()).count();
    let win_rate = if closed > 0 { won as f64 / closed as f64 } else { 0.0 };

    let stages = LeadStatus::ALL
        .iter()
        .map(|&status| {
            let in_stage: Vec<&Lead> = dataset
                .leads
                .iter()
                .filter(|l| l.status == status)
                .collect();
            let days: Vec<f64> = in_stage
                .iter()
                .map(|l| {
                    let span = if status.is_closed() {
                        l.updated_at - l.created_at
                    } else {
                        now - l.updated_at
                    };
                    span.num_seconds().max(0) as f64 / 86_400.0
                })
                .collect();

            LifecycleStage {
                status,
                count: in_stage.len(),
                percentage: if total > 0 {
                    in_stage.len() as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                average_days_in_stage: (!days.is_empty()).then(|| mean(&days)),
                conversion_estimate: win_rate,
            }
        })
        .collect();

    LifecycleAnalysis {
        total_leads: total,
        overall_win_rate: win_rate,
        stages,
    }
}

// ============================================================================
// Engagement segments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    HighlyEngaged,
    Engaged,
    LowEngagement,
    Unengaged,
}

impl EngagementLevel {
    pub const ALL: [EngagementLevel; 4] = [
        Self::HighlyEngaged,
        Self::Engaged,
        Self::LowEngagement,
        Self::Unengaged,
    ];

    pub fn from_communications(count: usize) -> Self {
        match count {
            0 => Self::Unengaged,
            1..=4 => Self::LowEngagement,
            5..=9 => Self::Engaged,
            _ => Self::HighlyEngaged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSegment {
    pub segment: EngagementLevel,
    pub lead_count: usize,
    pub average_score: f64,
    pub average_communications: f64,
    pub conversion_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralSegmentation {
    pub total_leads: usize,
    pub segments: Vec<EngagementSegment>,
}

pub fn behavioral_segmentation(dataset: &OrgDataset) -> BehavioralSegmentation {
    let comms = dataset.communications_by_lead();
    let counted: Vec<(&Lead, usize)> = dataset
        .leads
        .iter()
        .map(|l| (l, comms.get(&l.id).map_or(0, Vec::len)))
        .collect();

    let segments = EngagementLevel::ALL
        .iter()
        .map(|&level| {
            let members: Vec<&(&Lead, usize)> = counted
                .iter()
                .filter(|(_, c)| EngagementLevel::from_communications(*c) == level)
                .collect();
            let n = members.len();
            let closed = members.iter().filter(|(l, _)| l.is_closed()).count();
            let won = members.iter().filter(|(l, _)| l.is_won()).count();
            let avg = |sum: f64| if n > 0 { sum / n as f64 } else { 0.0 };

            EngagementSegment {
                segment: level,
                lead_count: n,
                average_score: avg(members.iter().map(|(l, _)| l.score as f64).sum()),
                average_communications: avg(members.iter().map(|(_, c)| *c as f64).sum()),
                conversion_rate: (closed > 0).then(|| won as f64 / closed as f64),
            }
        })
        .collect();

    BehavioralSegmentation {
        total_leads: dataset.leads.len(),
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::CommunicationDirection::{Inbound, Outbound};
    use crate::core::shared::enums::CommunicationType::{Call, Email, Meeting};
    use crate::core::shared::test_utils::{assert_close, communication, reference_now, LeadBuilder};
    use chrono::Duration;
    use uuid::Uuid;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_period_starts_and_labels() {
        // 2024-06-15 is a Saturday
        let t = at(2024, 6, 15);
        let midnight = |m, d| Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap();
        assert_eq!(CohortPeriod::Week.start_of(t), midnight(6, 10));
        assert_eq!(CohortPeriod::Month.start_of(t), midnight(6, 1));
        assert_eq!(CohortPeriod::Quarter.start_of(t), midnight(4, 1));

        assert_eq!(CohortPeriod::Week.label(CohortPeriod::Week.start_of(t)), "2024-W24");
        assert_eq!(CohortPeriod::Month.label(t), "2024-06");
        assert_eq!(CohortPeriod::Quarter.label(t), "2024-Q2");
        // ISO week-year differs from calendar year at the boundary
        assert_eq!(CohortPeriod::Week.label(at(2024, 12, 30)), "2025-W01");
    }

    #[test]
    fn test_week_start_near_min_date_does_not_underflow() {
        let earliest = Utc.from_utc_datetime(&NaiveDate::MIN.and_time(chrono::NaiveTime::MIN));
        assert_eq!(CohortPeriod::Week.start_of(earliest), earliest);

        let latest = Utc.from_utc_datetime(&NaiveDate::MAX.and_time(chrono::NaiveTime::MIN));
        assert!(CohortPeriod::Week.advance(latest, 1).is_err());
        assert!(CohortPeriod::Month.advance(latest, 1).is_err());
    }

    #[test]
    fn test_advance_crosses_year() {
        let nov = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(
            CohortPeriod::Month.advance(nov, 3).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            CohortPeriod::Quarter.advance(nov, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_monthly_cohort_retention_and_conversion() {
        let org = Uuid::new_v4();
        let now = reference_now();
        let a = LeadBuilder::new(org).created_at(at(2024, 3, 5)).build();
        let b = LeadBuilder::new(org)
            .status(LeadStatus::ClosedWon)
            .value(250_000)
            .created_at(at(2024, 3, 20))
            .updated_at(at(2024, 4, 10))
            .build();
        let c = LeadBuilder::new(org).created_at(at(2024, 5, 2)).build();

        let comms = vec![
            communication(&a, Email, Outbound, at(2024, 3, 6)),
            communication(&b, Call, Outbound, at(2024, 3, 21)),
            communication(&b, Meeting, Inbound, at(2024, 4, 8)),
        ];
        let dataset = OrgDataset::new(org, vec![a, b, c], comms, vec![]);

        let analysis = analyze_cohorts(&dataset, CohortPeriod::Month, 6, now).unwrap();
        assert_eq!(analysis.cohorts.len(), 2);

        let march = &analysis.cohorts[0];
        assert_eq!(march.label, "2024-03");
        assert_eq!(march.size, 2);
        // March through June have started by mid-June
        assert_eq!(march.periods.len(), 4);
        assert_close(march.periods[0].retention_rate, 1.0, 1e-12);
        assert_close(march.periods[1].retention_rate, 0.5, 1e-12);
        assert_eq!(march.periods[0].conversions, 0);
        assert_eq!(march.periods[1].conversions, 1);
        assert_close(march.periods[1].conversion_rate, 0.5, 1e-12);
        assert_close(march.periods[1].revenue, 2500.0, 1e-9);
        assert_eq!(march.periods[3].conversions, 1);

        let may = &analysis.cohorts[1];
        assert_eq!(may.periods.len(), 2);
        assert_eq!(may.periods[0].retention_rate, 0.0);

        assert_eq!(analysis.average_retention.len(), 4);
        assert_close(analysis.average_retention[0], 0.5, 1e-12);
        assert_close(analysis.average_retention[1], 0.25, 1e-12);
    }

    #[test]
    fn test_cohort_bounds_validated() {
        let dataset = OrgDataset::default();
        assert!(analyze_cohorts(&dataset, CohortPeriod::Week, 0, reference_now()).is_err());
        assert!(analyze_cohorts(&dataset, CohortPeriod::Week, 53, reference_now()).is_err());
        let empty = analyze_cohorts(&dataset, CohortPeriod::Week, 4, reference_now()).unwrap();
        assert!(empty.cohorts.is_empty());
        assert!(empty.average_retention.is_empty());
    }

    #[test]
    fn test_lifecycle_stages() {
        let org = Uuid::new_v4();
        let now = reference_now();
        let leads = vec![
            LeadBuilder::new(org).updated_at(now - Duration::days(4)).build(),
            LeadBuilder::new(org).updated_at(now - Duration::days(2)).build(),
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedWon)
                .created_at(now - Duration::days(40))
                .closed_after_days(20)
                .build(),
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedLost)
                .created_at(now - Duration::days(40))
                .closed_after_days(10)
                .build(),
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedLost)
                .created_at(now - Duration::days(40))
                .closed_after_days(30)
                .build(),
        ];
        let dataset = OrgDataset::new(org, leads, vec![], vec![]);
        let analysis = lifecycle_stage_analysis(&dataset, now);

        assert_eq!(analysis.total_leads, 5);
        assert_close(analysis.overall_win_rate, 1.0 / 3.0, 1e-12);
        assert_eq!(analysis.stages.len(), 7);

        let new = &analysis.stages[0];
        assert_eq!(new.status, LeadStatus::New);
        assert_eq!(new.count, 2);
        assert_close(new.percentage, 40.0, 1e-12);
        assert_close(new.average_days_in_stage.unwrap(), 3.0, 1e-9);

        let contacted = &analysis.stages[1];
        assert_eq!(contacted.count, 0);
        assert!(contacted.average_days_in_stage.is_none());

        let lost = &analysis.stages[6];
        assert_eq!(lost.status, LeadStatus::ClosedLost);
        assert_close(lost.average_days_in_stage.unwrap(), 20.0, 1e-9);
        assert!(analysis.stages.iter().all(|s| s.conversion_estimate == analysis.overall_win_rate));
    }

    #[test]
    fn test_segments_reported_even_when_empty() {
        let org = Uuid::new_v4();
        let now = reference_now();
        let busy = LeadBuilder::new(org)
            .score(80)
            .status(LeadStatus::ClosedWon)
            .closed_after_days(3)
            .build();
        let quiet = LeadBuilder::new(org).score(20).build();
        let comms: Vec<_> = (0..12)
            .map(|_| communication(&busy, Email, Outbound, now))
            .collect();
        let dataset = OrgDataset::new(org, vec![busy, quiet], comms, vec![]);

        let seg = behavioral_segmentation(&dataset);
        assert_eq!(seg.total_leads, 2);
        assert_eq!(seg.segments.len(), 4);

        let high = &seg.segments[0];
        assert_eq!(high.segment, EngagementLevel::HighlyEngaged);
        assert_eq!(high.lead_count, 1);
        assert_close(high.average_score, 80.0, 1e-12);
        assert_close(high.average_communications, 12.0, 1e-12);
        assert_eq!(high.conversion_rate, Some(1.0));

        assert_eq!(seg.segments[1].lead_count, 0);
        assert!(seg.segments[1].conversion_rate.is_none());

        let unengaged = &seg.segments[3];
        assert_eq!(unengaged.lead_count, 1);
        assert!(unengaged.conversion_rate.is_none());
    }

    #[test]
    fn test_engagement_boundaries() {
        assert_eq!(EngagementLevel::from_communications(0), EngagementLevel::Unengaged);
        assert_eq!(EngagementLevel::from_communications(4), EngagementLevel::LowEngagement);
        assert_eq!(EngagementLevel::from_communications(5), EngagementLevel::Engaged);
        assert_eq!(EngagementLevel::from_communications(9), EngagementLevel::Engaged);
        assert_eq!(EngagementLevel::from_communications(10), EngagementLevel::HighlyEngaged);
    }
}
