//! Pipeline metrics and report building blocks computed straight from a
//! dataset snapshot.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::dataset::OrgDataset;
use crate::analytics::error::AnalyticsResult;
use crate::analytics::predictive::{money, YearMonth};
use crate::analytics::statistics::{
    mean, CorrelationMethod, CorrelationResult, DescriptiveStats, StatisticalEngine,
    TrendAnalysis,
};
use crate::core::shared::enums::{LeadSource, LeadStatus, LeadTemperature};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub key: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStatistics {
    pub total_leads: usize,
    /// `None` with fewer than two leads.
    pub score_statistics: Option<DescriptiveStats>,
    pub status_distribution: Vec<DistributionEntry>,
    pub source_distribution: Vec<DistributionEntry>,
    pub temperature_distribution: Vec<DistributionEntry>,
}

fn distribution<K, F>(dataset: &OrgDataset, keys: &[K], key_of: F) -> Vec<DistributionEntry>
where
    K: PartialEq + std::fmt::Display,
    F: Fn(&crate::core::shared::models::Lead) -> K,
{
    let total = dataset.leads.len();
    keys.iter()
        .map(|key| {
            let count = dataset.leads.iter().filter(|l| key_of(l) == *key).count();
            DistributionEntry {
                key: key.to_string(),
                count,
                percentage: if total > 0 {
                    count as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

pub fn lead_statistics(engine: &StatisticalEngine, dataset: &OrgDataset) -> LeadStatistics {
    let scores: Vec<f64> = dataset.leads.iter().map(|l| l.score as f64).collect();

    LeadStatistics {
        total_leads: dataset.leads.len(),
        score_statistics: engine.calculate_descriptive_stats(&scores).ok(),
        status_distribution: distribution(dataset, &LeadStatus::ALL, |l| l.status),
        source_distribution: distribution(dataset, &LeadSource::ALL, |l| l.source),
        temperature_distribution: distribution(dataset, &LeadTemperature::ALL, |l| {
            l.lead_temperature
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyScore {
    pub date: NaiveDate,
    pub mean_score: f64,
    pub changes: usize,
}

/// Mean `new_score` of the organization's score changes per UTC day.
pub fn daily_score_series(dataset: &OrgDataset) -> Vec<DailyScore> {
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for entry in &dataset.score_history {
        let slot = by_day.entry(entry.created_at.date_naive()).or_insert((0.0, 0));
        slot.0 += entry.new_score as f64;
        slot.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (sum, changes))| DailyScore {
            date,
            mean_score: sum / changes as f64,
            changes,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreTrend {
    pub days: Vec<DailyScore>,
    pub trend: TrendAnalysis,
}

pub fn score_trend(
    engine: &StatisticalEngine,
    dataset: &OrgDataset,
) -> AnalyticsResult<ScoreTrend> {
    let days = daily_score_series(dataset);
    let values: Vec<f64> = days.iter().map(|d| d.mean_score).collect();
    let trend = engine.analyze_trend(&values)?;
    Ok(ScoreTrend { days, trend })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationInsights {
    pub score_vs_value: Option<CorrelationResult>,
    pub score_vs_communications: Option<CorrelationResult>,
}

pub fn correlation_insights(
    engine: &StatisticalEngine,
    dataset: &OrgDataset,
) -> CorrelationInsights {
    let (scores, values): (Vec<f64>, Vec<f64>) = dataset
        .leads
        .iter()
        .filter_map(|l| l.value.map(|v| (l.score as f64, money(v))))
        .unzip();

    let comms = dataset.communications_by_lead();
    let all_scores: Vec<f64> = dataset.leads.iter().map(|l| l.score as f64).collect();
    let counts: Vec<f64> = dataset
        .leads
        .iter()
        .map(|l| comms.get(&l.id).map_or(0, Vec::len) as f64)
        .collect();

    let attempt = |x: &[f64], y: &[f64], what: &str| {
        engine
            .calculate_correlation(x, y, CorrelationMethod::Pearson)
            .map_err(|e| log::debug!("Skipping {what} correlation: {e}"))
            .ok()
    };

    CorrelationInsights {
        score_vs_value: attempt(&scores, &values, "score/value"),
        score_vs_communications: attempt(&all_scores, &counts, "score/communications"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub total_leads: usize,
    pub open_leads: usize,
    pub won_leads: usize,
    pub lost_leads: usize,
    /// won / (won + lost); `None` until something has closed.
    pub win_rate: Option<f64>,
    pub average_deal_size: Option<f64>,
    /// Summed value of open leads.
    pub pipeline_value: f64,
    pub average_sales_cycle_days: Option<f64>,
    pub new_leads_this_month: usize,
    pub new_leads_last_month: usize,
    /// Percent change of new leads this calendar month against the previous one.
    pub lead_velocity_rate: Option<f64>,
}

pub fn advanced_metrics(dataset: &OrgDataset, now: DateTime<Utc>) -> AdvancedMetrics {
    let leads = &dataset.leads;
    let won: Vec<_> = leads.iter().filter(|l| l.is_won()).collect();
    let lost = leads.iter().filter(|l| l.status == LeadStatus::ClosedLost).count();
    let open: Vec<_> = leads.iter().filter(|l| !l.is_closed()).collect();

    let win_rate = (won.len() + lost > 0).then(|| won.len() as f64 / (won.len() + lost) as f64);

    let deal_values: Vec<f64> = won.iter().filter_map(|l| l.value).map(money).collect();
    let average_deal_size = (!deal_values.is_empty()).then(|| mean(&deal_values));

    let cycles: Vec<f64> = won
        .iter()
        .map(|l| (l.updated_at - l.created_at).num_seconds().max(0) as f64 / 86_400.0)
        .collect();
    let average_sales_cycle_days = (!cycles.is_empty()).then(|| mean(&cycles));

    let this_month = YearMonth::of(now);
    let last_month = if now.month() == 1 {
        YearMonth {
            year: now.year() - 1,
            month: 12,
        }
    } else {
        YearMonth {
            year: now.year(),
            month: now.month() - 1,
        }
    };
    let created_in = |m: YearMonth| {
        leads
            .iter()
            .filter(|l| YearMonth::of(l.created_at) == m)
            .count()
    };
    let new_leads_this_month = created_in(this_month);
    let new_leads_last_month = created_in(last_month);
    let lead_velocity_rate = (new_leads_last_month > 0).then(|| {
        (new_leads_this_month as f64 - new_leads_last_month as f64) / new_leads_last_month as f64
            * 100.0
    });

    AdvancedMetrics {
        total_leads: leads.len(),
        open_leads: open.len(),
        won_leads: won.len(),
        lost_leads: lost,
        win_rate,
        average_deal_size,
        pipeline_value: open.iter().filter_map(|l| l.value).map(money).sum(),
        average_sales_cycle_days,
        new_leads_this_month,
        new_leads_last_month,
        lead_velocity_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::{CommunicationDirection, CommunicationType};
    use crate::core::shared::test_utils::{
        assert_close, communication, reference_now, score_entry, LeadBuilder,
    };
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    #[test]
    fn test_lead_statistics_distributions() {
        let org = Uuid::new_v4();
        let leads = vec![
            LeadBuilder::new(org).score(80).source(LeadSource::Referral).build(),
            LeadBuilder::new(org).score(50).source(LeadSource::Referral).build(),
            LeadBuilder::new(org).score(20).status(LeadStatus::Contacted).build(),
            LeadBuilder::new(org).score(10).build(),
        ];
        let dataset = OrgDataset::new(org, leads, vec![], vec![]);
        let stats = lead_statistics(&StatisticalEngine::default(), &dataset);

        assert_eq!(stats.total_leads, 4);
        assert_close(stats.score_statistics.unwrap().mean, 40.0, 1e-12);
        assert_eq!(stats.status_distribution.len(), 7);
        assert_eq!(stats.status_distribution[0].key, "new");
        assert_eq!(stats.status_distribution[0].count, 3);
        assert_close(stats.status_distribution[0].percentage, 75.0, 1e-12);
        let referral = stats
            .source_distribution
            .iter()
            .find(|d| d.key == "referral")
            .unwrap();
        assert_eq!(referral.count, 2);
        let hot = &stats.temperature_distribution[0];
        assert_eq!((hot.key.as_str(), hot.count), ("hot", 1));
    }

    #[test]
    fn test_single_lead_has_no_score_statistics() {
        let org = Uuid::new_v4();
        let dataset = OrgDataset::new(org, vec![LeadBuilder::new(org).build()], vec![], vec![]);
        assert!(lead_statistics(&StatisticalEngine::default(), &dataset)
            .score_statistics
            .is_none());
    }

    #[test]
    fn test_daily_series_and_trend() {
        let org = Uuid::new_v4();
        let lead = LeadBuilder::new(org).build();
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
        let history = vec![
            score_entry(&lead, 0, 10, day(1, 9)),
            score_entry(&lead, 10, 30, day(1, 15)),
            score_entry(&lead, 30, 40, day(2, 9)),
            score_entry(&lead, 40, 60, day(3, 9)),
        ];
        let dataset = OrgDataset::new(org, vec![lead], vec![], history);
        let series = daily_score_series(&dataset);
        assert_eq!(series.len(), 3);
        assert_close(series[0].mean_score, 20.0, 1e-12);
        assert_eq!(series[0].changes, 2);

        let trend = score_trend(&StatisticalEngine::default(), &dataset).unwrap();
        assert_close(trend.trend.slope, 20.0, 1e-9);
    }

    #[test]
    fn test_correlation_insights_skip_missing_values() {
        let org = Uuid::new_v4();
        let now = reference_now();
        let mut leads = Vec::new();
        let mut comms = Vec::new();
        for i in 0..6 {
            let mut b = LeadBuilder::new(org).score(10 * i);
            if i % 2 == 0 {
                b = b.value(100_000 * (i as i64 + 1));
            }
            let lead = b.build();
            for _ in 0..i {
                comms.push(communication(
                    &lead,
                    CommunicationType::Call,
                    CommunicationDirection::Outbound,
                    now,
                ));
            }
            leads.push(lead);
        }
        let dataset = OrgDataset::new(org, leads, comms, vec![]);
        let insights = correlation_insights(&StatisticalEngine::default(), &dataset);

        let by_value = insights.score_vs_value.unwrap();
        assert_eq!(by_value.sample_size, 3);
        assert_close(by_value.coefficient, 1.0, 1e-9);
        let by_comms = insights.score_vs_communications.unwrap();
        assert_eq!(by_comms.sample_size, 6);
    }

    #[test]
    fn test_advanced_metrics() {
        let org = Uuid::new_v4();
        let now = reference_now();
        let leads = vec![
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedWon)
                .value(300_000)
                .created_at(now - Duration::days(50))
                .closed_after_days(10)
                .build(),
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedWon)
                .value(100_000)
                .created_at(now - Duration::days(40))
                .closed_after_days(30)
                .build(),
            LeadBuilder::new(org)
                .status(LeadStatus::ClosedLost)
                .created_at(now - Duration::days(20))
                .closed_after_days(5)
                .build(),
            LeadBuilder::new(org).value(50_000).created_at(now - Duration::days(2)).build(),
            LeadBuilder::new(org).value(25_000).created_at(now - Duration::days(3)).build(),
        ];
        let dataset = OrgDataset::new(org, leads, vec![], vec![]);
        let m = advanced_metrics(&dataset, now);

        assert_eq!(m.total_leads, 5);
        assert_eq!((m.won_leads, m.lost_leads, m.open_leads), (2, 1, 2));
        assert_close(m.win_rate.unwrap(), 2.0 / 3.0, 1e-12);
        assert_close(m.average_deal_size.unwrap(), 2000.0, 1e-9);
        assert_close(m.pipeline_value, 750.0, 1e-9);
        assert_close(m.average_sales_cycle_days.unwrap(), 20.0, 1e-9);
        // June holds the two open leads, May the leads created on the 6th and 26th
        assert_eq!(m.new_leads_this_month, 2);
        assert_eq!(m.new_leads_last_month, 2);
        assert_close(m.lead_velocity_rate.unwrap(), 0.0, 1e-12);
    }
}
