use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::analyzers::utility::{round_to, safe_div};
use crate::record::{CycleRecord, Metric};

/// Dimension a breakdown groups on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lane,
    Intersection,
    /// One row per vehicle type; values are the per-type counts and the
    /// metric argument is ignored.
    VehicleType,
}

/// One bar group: a category with one averaged value per run.
///
/// Serializes flat, as `{"category": "LaneN", "<run>": value, ...}`. A run
/// literally named `category` therefore collides with the label key in JSON;
/// the in-memory row keeps both, so rename such a run before emitting JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub category: String,
    /// Averaged value per run id.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Default)]
struct Tally {
    sum: f64,
    count: usize,
}

/// Pivots records into one row per category value.
///
/// With `cycle` set, only records of that cycle are used. Every row carries a
/// value for every run present in the (cycle-filtered) input; a run with no
/// records in a category gets 0. Rows come out in first-seen category order.
pub fn build_breakdown(
    records: &[CycleRecord],
    category: Category,
    metric: Metric,
    cycle: Option<u32>,
) -> Vec<BreakdownRow> {
    let selected: Vec<&CycleRecord> = records
        .iter()
        .filter(|r| cycle.is_none_or(|c| r.cycle_id == c))
        .collect();
    if selected.is_empty() {
        return Vec::new();
    }

    let runs = distinct_runs(&selected);

    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, HashMap<&str, Tally>> = HashMap::new();

    for r in selected.iter().copied() {
        for (label, value) in observations(r, category, metric) {
            let per_run = tallies.entry(label.clone()).or_insert_with(|| {
                order.push(label);
                HashMap::new()
            });
            let t = per_run.entry(r.run_id.as_str()).or_default();
            t.sum += value;
            t.count += 1;
        }
    }

    order
        .into_iter()
        .map(|label| {
            let per_run = tallies.get(&label);
            let values = runs
                .iter()
                .map(|run| {
                    let avg = per_run
                        .and_then(|m| m.get(run.as_str()))
                        .map(|t| round_to(safe_div(t.sum, t.count), 1))
                        .unwrap_or(0.0);
                    (run.clone(), avg)
                })
                .collect();
            BreakdownRow {
                category: label,
                values,
            }
        })
        .collect()
}

fn distinct_runs(records: &[&CycleRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut runs = Vec::new();
    for r in records.iter().copied() {
        if seen.insert(r.run_id.as_str()) {
            runs.push(r.run_id.clone());
        }
    }
    runs
}

fn observations(r: &CycleRecord, category: Category, metric: Metric) -> Vec<(String, f64)> {
    match category {
        Category::Lane => vec![(r.lane_id.clone(), metric.value(r))],
        Category::Intersection => vec![(r.intersection_id.clone(), metric.value(r))],
        Category::VehicleType => r
            .vehicle_counts()
            .iter()
            .map(|(label, count)| (label.to_string(), *count))
            .collect(),
    }
}
