//! Record selection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::record::{ALL_INTERSECTIONS, CycleRecord};

/// Query parameters for one dashboard view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Runs to include. Empty selects nothing.
    pub runs: Vec<String>,
    /// An intersection id, or [`ALL_INTERSECTIONS`].
    pub intersection: String,
    /// Inclusive `(min, max)` cycle range.
    pub cycle_range: (u32, u32),
    /// Drop records missing occupancy or total count.
    pub hide_incomplete: bool,
}

impl Selection {
    /// Every run, every intersection, cycles `1..=max_cycle`.
    pub fn everything(runs: Vec<String>, max_cycle: u32) -> Self {
        Self {
            runs,
            intersection: ALL_INTERSECTIONS.to_string(),
            cycle_range: (1, max_cycle.max(1)),
            hide_incomplete: false,
        }
    }

    /// Whether a single record passes this selection.
    pub fn matches(&self, r: &CycleRecord) -> bool {
        let (lo, hi) = self.cycle_range;
        self.runs.iter().any(|run| *run == r.run_id)
            && (self.intersection == ALL_INTERSECTIONS || self.intersection == r.intersection_id)
            && (lo..=hi).contains(&r.cycle_id)
            && (!self.hide_incomplete || r.is_complete())
    }
}

/// Returns the records that pass `selection`, in input order.
///
/// An empty run list yields an empty result; callers that mean "all runs"
/// must list them.
pub fn filter_records(records: &[CycleRecord], selection: &Selection) -> Vec<CycleRecord> {
    records
        .iter()
        .filter(|r| selection.matches(r))
        .cloned()
        .collect()
}

/// Drops lane rows that are shadowed by an aggregate row.
///
/// For every `(run_id, intersection_id, cycle_id)` that has an `Aggregate`
/// row only the aggregate row is kept. Groups made of lane rows only are kept
/// whole. Run this before [`compute_kpis`](super::kpi::compute_kpis) on mixed
/// data, otherwise lane rows deflate the averages.
pub fn representative_rows(records: &[CycleRecord]) -> Vec<CycleRecord> {
    let aggregated: HashSet<(&str, &str, u32)> = records
        .iter()
        .filter(|r| r.is_aggregate())
        .map(|r| (r.run_id.as_str(), r.intersection_id.as_str(), r.cycle_id))
        .collect();

    records
        .iter()
        .filter(|r| {
            r.is_aggregate()
                || !aggregated.contains(&(r.run_id.as_str(), r.intersection_id.as_str(), r.cycle_id))
        })
        .cloned()
        .collect()
}

/// Distinct values of `key` in first-seen order.
pub fn distinct<'a, F>(records: &'a [CycleRecord], key: F) -> Vec<String>
where
    F: Fn(&'a CycleRecord) -> &'a str,
{
    let mut seen = HashSet::new();
    records
        .iter()
        .map(key)
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}
