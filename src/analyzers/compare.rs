//! Treatment-versus-baseline percentages.
//!
//! A zero baseline always yields 0 so the numbers can be rendered as-is.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::analyzers::utility::round_half_up;

/// `(treatment - baseline) / baseline * 100`, or 0 for a zero baseline.
pub fn improvement(treatment: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (treatment - baseline) / baseline * 100.0
}

/// `(baseline - treatment) / baseline * 100`, or 0 for a zero baseline.
pub fn reduction(treatment: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (baseline - treatment) / baseline * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    HigherIsBetter,
    LowerIsBetter,
}

/// A signed change against the baseline and whether it met its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeMetric {
    pub name: String,
    pub treatment: f64,
    pub baseline: f64,
    /// [`improvement`] for higher-is-better, [`reduction`] for lower-is-better.
    pub percent_change: f64,
    pub orientation: Orientation,
    pub target_pct: f64,
    pub achieved_target: bool,
}

impl ComparativeMetric {
    pub fn evaluate(
        name: &str,
        treatment: f64,
        baseline: f64,
        orientation: Orientation,
        target_pct: f64,
    ) -> Self {
        let percent_change = match orientation {
            Orientation::HigherIsBetter => improvement(treatment, baseline),
            Orientation::LowerIsBetter => reduction(treatment, baseline),
        };
        ComparativeMetric {
            name: name.to_string(),
            treatment,
            baseline,
            percent_change,
            orientation,
            target_pct,
            achieved_target: percent_change >= target_pct,
        }
    }
}

/// Unsigned magnitude of a change plus its direction relative to the goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentageChange {
    pub value: f64,
    pub is_improvement: bool,
}

pub fn percentage_change(new_value: f64, baseline: f64, lower_is_better: bool) -> PercentageChange {
    if baseline == 0.0 {
        return PercentageChange {
            value: 0.0,
            is_improvement: false,
        };
    }
    let change = improvement(new_value, baseline);
    PercentageChange {
        value: change.abs(),
        is_improvement: if lower_is_better { change < 0.0 } else { change > 0.0 },
    }
}

/// Short label such as `"+18%"`, `"-5%"` or `"0%"`.
pub fn delta_label(current: f64, baseline: f64) -> String {
    if baseline == 0.0 {
        return "0%".to_string();
    }
    let delta = improvement(current, baseline);
    let sign = if delta > 0.0 { "+" } else { "" };
    format!("{sign}{}%", round_half_up(delta) as i64)
}

/// Picks, for each group, the item with the largest `order` value.
///
/// Ties keep the first item seen: a later item replaces the current pick
/// only when strictly greater. Groups come out in first-seen order.
pub fn latest_per_group<'a, T, K, G, O>(items: &'a [T], group: G, order: O) -> Vec<&'a T>
where
    K: Eq + Hash,
    G: Fn(&T) -> K,
    O: Fn(&T) -> u32,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut picks: Vec<&'a T> = Vec::new();

    for item in items {
        match index.get(&group(item)) {
            Some(&slot) => {
                if order(item) > order(picks[slot]) {
                    picks[slot] = item;
                }
            }
            None => {
                index.insert(group(item), picks.len());
                picks.push(item);
            }
        }
    }

    picks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_baseline_is_zero() {
        for t in [0.0, 1.0, -50.0, 1e9] {
            assert_eq!(improvement(t, 0.0), 0.0);
            assert_eq!(reduction(t, 0.0), 0.0);
        }
    }

    #[test]
    fn test_sign_convention() {
        assert!((improvement(110.0, 100.0) - 10.0).abs() < 1e-9);
        assert!((reduction(90.0, 100.0) - 10.0).abs() < 1e-9);
        assert!(improvement(90.0, 100.0) < 0.0);
    }

    #[test]
    fn test_evaluate_against_target() {
        let hit = ComparativeMetric::evaluate(
            "throughput",
            120.0,
            100.0,
            Orientation::HigherIsBetter,
            10.0,
        );
        assert!(hit.achieved_target);
        assert!((hit.percent_change - 20.0).abs() < 1e-9);

        let miss =
            ComparativeMetric::evaluate("waiting", 95.0, 100.0, Orientation::LowerIsBetter, 10.0);
        assert!(!miss.achieved_target);
        assert!((miss.percent_change - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_boundary_counts_as_achieved() {
        let m =
            ComparativeMetric::evaluate("waiting", 50.0, 100.0, Orientation::LowerIsBetter, 50.0);
        assert!(m.achieved_target);
    }

    #[test]
    fn test_percentage_change_direction() {
        let down = percentage_change(80.0, 100.0, true);
        assert!((down.value - 20.0).abs() < 1e-9);
        assert!(down.is_improvement);

        let up = percentage_change(80.0, 100.0, false);
        assert!(!up.is_improvement);

        let zero = percentage_change(80.0, 0.0, false);
        assert_eq!(zero.value, 0.0);
        assert!(!zero.is_improvement);
    }

    #[test]
    fn test_delta_label() {
        assert_eq!(delta_label(130.0, 110.0), "+18%");
        assert_eq!(delta_label(95.0, 100.0), "-5%");
        assert_eq!(delta_label(100.0, 100.0), "0%");
        assert_eq!(delta_label(5.0, 0.0), "0%");
    }

    #[test]
    fn test_delta_label_negative_half_rounds_up() {
        assert_eq!(delta_label(97.5, 100.0), "-2%");
        assert_eq!(delta_label(102.5, 100.0), "+3%");
    }

    #[test]
    fn test_latest_per_group_first_wins_on_tie() {
        let items: Vec<(&str, u32, &str)> = vec![
            ("X", 1, "a"),
            ("Y", 3, "b"),
            ("X", 4, "c"),
            ("X", 4, "d"),
            ("Y", 2, "e"),
        ];

        let latest = latest_per_group(&items, |i| i.0, |i| i.1);

        let tags: Vec<&str> = latest.iter().map(|i| i.2).collect();
        assert_eq!(tags, vec!["c", "b"]);
    }

    #[test]
    fn test_latest_per_group_empty() {
        let items: Vec<(u8, u32)> = Vec::new();
        assert!(latest_per_group(&items, |i| i.0, |i| i.1).is_empty());
    }
}
