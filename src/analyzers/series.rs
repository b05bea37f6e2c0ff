use std::collections::HashMap;

use serde::Serialize;

use crate::analyzers::utility::{mean, round_to};
use crate::record::{CycleRecord, Metric};

/// One point of a per-run line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub cycle_id: u32,
    pub run_id: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_step: Option<u32>,
}

/// Pivots records into one point per `(run_id, cycle_id)`, sorted by cycle.
///
/// Several records for the same pair (lane rows, say) are averaged. Pairs
/// keep their first-seen order within a cycle.
pub fn build_time_series(records: &[CycleRecord], metric: Metric) -> Vec<SeriesPoint> {
    let mut index: HashMap<(&str, u32), usize> = HashMap::new();
    let mut groups: Vec<(&CycleRecord, Vec<f64>)> = Vec::new();

    for r in records {
        let key = (r.run_id.as_str(), r.cycle_id);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((r, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(metric.value(r));
    }

    let mut points: Vec<SeriesPoint> = groups
        .into_iter()
        .map(|(first, values)| SeriesPoint {
            cycle_id: first.cycle_id,
            run_id: first.run_id.clone(),
            value: round_to(mean(&values), 1),
            timestamp_step: first.timestamp_step,
        })
        .collect();

    // stable: equal cycles keep insertion order
    points.sort_by_key(|p| p.cycle_id);
    points
}
