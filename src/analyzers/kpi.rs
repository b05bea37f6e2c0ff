use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::analyzers::utility::{round_to, safe_div};
use crate::record::CycleRecord;

/// Averaged metrics over a set of cycle records.
///
/// Counts, throughputs and times carry one decimal; occupancy, coordination
/// and reward carry two.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiData {
    pub avg_total_queue: f64,
    pub avg_throughput: f64,
    pub avg_occupancy: f64,
    pub avg_waiting_time: f64,
    pub avg_speed: f64,
    pub avg_completed_trips: f64,
    pub avg_passenger_throughput: f64,
    pub avg_public_vehicle_throughput: f64,
    pub avg_tsp_activations: f64,
    pub avg_coordination_score: f64,
    /// Mean over records that report a reward; `None` when none do.
    pub avg_reward: Option<f64>,
}

impl KpiData {
    /// The all-zero result returned for an empty record set.
    pub fn zeroed() -> Self {
        KpiData {
            avg_total_queue: 0.0,
            avg_throughput: 0.0,
            avg_occupancy: 0.0,
            avg_waiting_time: 0.0,
            avg_speed: 0.0,
            avg_completed_trips: 0.0,
            avg_passenger_throughput: 0.0,
            avg_public_vehicle_throughput: 0.0,
            avg_tsp_activations: 0.0,
            avg_coordination_score: 0.0,
            avg_reward: Some(0.0),
        }
    }

    fn rounded(self) -> Self {
        KpiData {
            avg_total_queue: round_to(self.avg_total_queue, 1),
            avg_throughput: round_to(self.avg_throughput, 1),
            avg_occupancy: round_to(self.avg_occupancy, 2),
            avg_waiting_time: round_to(self.avg_waiting_time, 1),
            avg_speed: round_to(self.avg_speed, 1),
            avg_completed_trips: round_to(self.avg_completed_trips, 1),
            avg_passenger_throughput: round_to(self.avg_passenger_throughput, 1),
            avg_public_vehicle_throughput: round_to(self.avg_public_vehicle_throughput, 1),
            avg_tsp_activations: round_to(self.avg_tsp_activations, 1),
            avg_coordination_score: round_to(self.avg_coordination_score, 2),
            avg_reward: self.avg_reward.map(|r| round_to(r, 2)),
        }
    }
}

/// Either one overall KPI set or one per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiView {
    Overall(KpiData),
    ByRun(BTreeMap<String, KpiData>),
}

/// Chooses between [`compute_kpis`] and [`compute_kpis_by_run`].
pub fn compute(records: &[CycleRecord], group_by_run: bool) -> KpiView {
    if group_by_run {
        KpiView::ByRun(compute_kpis_by_run(records))
    } else {
        KpiView::Overall(compute_kpis(records))
    }
}

/// Averages every metric over `records`.
///
/// Missing values count as 0 and the denominator is always `records.len()`,
/// except for reward which averages only the records that carry one.
///
/// The records must not mix lane rows with the aggregate row for the same
/// cycle; see [`representative_rows`](super::filter::representative_rows).
pub fn compute_kpis(records: &[CycleRecord]) -> KpiData {
    if records.is_empty() {
        return KpiData::zeroed();
    }

    let n = records.len();
    let avg = |f: fn(&CycleRecord) -> f64| safe_div(records.iter().map(f).sum(), n);

    let rewards: Vec<f64> = records.iter().filter_map(|r| r.reward).collect();
    let avg_reward = if rewards.is_empty() {
        None
    } else {
        Some(safe_div(rewards.iter().sum(), rewards.len()))
    };

    let kpi = KpiData {
        avg_total_queue: avg(|r| r.total_queue),
        avg_throughput: avg(|r| r.throughput_pcu),
        avg_occupancy: avg(|r| r.occupancy.unwrap_or(0.0)),
        avg_waiting_time: avg(|r| r.waiting_time),
        avg_speed: avg(|r| r.avg_speed),
        avg_completed_trips: avg(|r| r.completed_trips),
        avg_passenger_throughput: avg(|r| r.passenger_throughput),
        avg_public_vehicle_throughput: avg(|r| r.public_vehicle_throughput),
        avg_tsp_activations: avg(|r| r.tsp_activations),
        avg_coordination_score: avg(|r| r.coordination_score),
        avg_reward,
    };

    debug!(
        records = n,
        rewarded = rewards.len(),
        avg_passenger_throughput = kpi.avg_passenger_throughput,
        avg_waiting_time = kpi.avg_waiting_time,
        "Computed KPIs"
    );

    kpi.rounded()
}

/// Partitions by `run_id` and computes one [`KpiData`] per run.
pub fn compute_kpis_by_run(records: &[CycleRecord]) -> BTreeMap<String, KpiData> {
    let mut groups: BTreeMap<&str, Vec<CycleRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.run_id.as_str()).or_default().push(r.clone());
    }

    groups
        .into_iter()
        .map(|(run, rows)| (run.to_string(), compute_kpis(&rows)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero_filled() {
        let kpi = compute_kpis(&[]);
        assert_eq!(kpi, KpiData::zeroed());
        assert_eq!(kpi.avg_reward, Some(0.0));
        assert!(!kpi.avg_throughput.is_nan());
    }

    #[test]
    fn test_grouped_empty_is_empty_map() {
        assert!(compute_kpis_by_run(&[]).is_empty());
    }

    #[test]
    fn test_averages_and_rounding() {
        let mut a = record("A", 1, 100.0);
        a.occupancy = Some(0.336);
        a.waiting_time = 10.04;
        let mut b = record("A", 2, 121.0);
        b.occupancy = Some(0.5);
        b.waiting_time = 10.0;

        let kpi = compute_kpis(&[a, b]);

        assert_eq!(kpi.avg_throughput, 110.5);
        assert_eq!(kpi.avg_occupancy, 0.42);
        assert_eq!(kpi.avg_waiting_time, 10.0);
    }

    #[test]
    fn test_missing_occupancy_counts_as_zero() {
        let a = record("A", 1, 0.0);
        let mut b = record("A", 2, 0.0);
        b.occupancy = None;

        let kpi = compute_kpis(&[a, b]);

        assert_eq!(kpi.avg_occupancy, 0.25);
    }

    #[test]
    fn test_reward_averages_only_defined_values() {
        let mut a = record("A", 1, 0.0);
        a.reward = Some(1.0);
        let mut b = record("A", 2, 0.0);
        b.reward = Some(2.0);
        let c = record("A", 3, 0.0);

        let kpi = compute_kpis(&[a, b, c]);

        assert_eq!(kpi.avg_reward, Some(1.5));
    }

    #[test]
    fn test_negative_reward_half_rounds_up() {
        let mut a = record("A", 1, 0.0);
        a.reward = Some(-0.125);

        let kpi = compute_kpis(&[a]);

        assert_eq!(kpi.avg_reward, Some(-0.12));
    }

    #[test]
    fn test_reward_absent_is_none() {
        let kpi = compute_kpis(&[record("Fixed Time", 1, 10.0)]);
        assert_eq!(kpi.avg_reward, None);
    }

    #[test]
    fn test_grouping_matches_per_run_computation() {
        let data = vec![
            record("Fixed Time", 1, 100.0),
            record("D3QN", 1, 130.0),
            record("Fixed Time", 2, 120.0),
            record("D3QN", 2, 150.0),
            record("D3QN", 3, 149.0),
        ];

        let grouped = compute_kpis_by_run(&data);

        assert_eq!(grouped.len(), 2);
        for (run, kpi) in &grouped {
            let subset: Vec<CycleRecord> =
                data.iter().filter(|r| &r.run_id == run).cloned().collect();
            assert_eq!(kpi, &compute_kpis(&subset));
        }
        assert_eq!(grouped["Fixed Time"].avg_throughput, 110.0);
        assert_eq!(grouped["D3QN"].avg_throughput, 143.0);
    }

    #[test]
    fn test_compute_dispatch() {
        let data = vec![record("A", 1, 10.0)];
        assert!(matches!(compute(&data, false), KpiView::Overall(_)));
        assert!(matches!(compute(&data, true), KpiView::ByRun(m) if m.len() == 1));
    }

    fn record(run: &str, cycle: u32, throughput: f64) -> CycleRecord {
        CycleRecord {
            run_id: run.to_string(),
            intersection_id: "Ecoland".to_string(),
            cycle_id: cycle,
            lane_id: "Aggregate".to_string(),
            total_count: Some(10),
            occupancy: Some(0.5),
            throughput_pcu: throughput,
            ..Default::default()
        }
    }
}
