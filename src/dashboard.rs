//! Pipeline entry point.
//!
//! A [`Dashboard`] owns one immutable dataset plus its [`PipelineConfig`] and
//! recomputes a [`DashboardView`] from scratch for every [`Selection`].

use serde::Serialize;
use tracing::{debug, instrument};

use crate::adapter::{NoiseSource, adapt_episodes};
use crate::analyzers::breakdown::{BreakdownRow, Category, build_breakdown};
use crate::analyzers::compare::{ComparativeMetric, Orientation, latest_per_group};
use crate::analyzers::filter::{Selection, distinct, filter_records, representative_rows};
use crate::analyzers::kpi::{KpiData, KpiView, compute};
use crate::analyzers::objectives::{ObjectiveReport, evaluate_dataset};
use crate::analyzers::series::{SeriesPoint, build_time_series};
use crate::config::PipelineConfig;
use crate::episode::TrainingEpisode;
use crate::record::{CycleRecord, Metric};
use crate::training::{TrainingLog, assemble_training};
use crate::validation::{ValidationEntry, assemble_episodes};

/// Everything the presentation layer needs for one selection.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub selection: Selection,
    pub total_records: usize,
    pub filtered_records: usize,
    /// Highest cycle in the filtered set; the KPIs describe this cycle.
    pub latest_cycle: Option<u32>,
    pub kpis: KpiView,
    pub comparisons: Vec<ComparativeMetric>,
    pub time_series: Vec<SeriesPoint>,
    pub breakdown: Vec<BreakdownRow>,
}

pub struct Dashboard {
    config: PipelineConfig,
    episodes: Vec<TrainingEpisode>,
    records: Vec<CycleRecord>,
}

impl Dashboard {
    /// Builds a dashboard over flat records, e.g. read from CSV.
    pub fn from_records(config: PipelineConfig, records: Vec<CycleRecord>) -> Self {
        Self {
            config,
            episodes: Vec::new(),
            records,
        }
    }

    /// Builds a dashboard over episodes, converting them once up front.
    pub fn from_episodes<N: NoiseSource>(
        config: PipelineConfig,
        episodes: Vec<TrainingEpisode>,
        noise: &mut N,
    ) -> Self {
        let records = adapt_episodes(&episodes, &config, noise);
        Self {
            config,
            episodes,
            records,
        }
    }

    /// Builds a dashboard over paired validation results.
    pub fn from_validation<N: NoiseSource>(
        config: PipelineConfig,
        entries: &[ValidationEntry],
        noise: &mut N,
    ) -> Self {
        let (mut episodes, baseline) = assemble_episodes(entries, &config, noise);
        episodes.extend(baseline);
        Self::from_episodes(config, episodes, noise)
    }

    /// Builds a dashboard over a training run log.
    pub fn from_training<N: NoiseSource>(
        config: PipelineConfig,
        log: &TrainingLog,
        noise: &mut N,
    ) -> Self {
        let episodes = assemble_training(log, &config);
        Self::from_episodes(config, episodes, noise)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    pub fn episodes(&self) -> &[TrainingEpisode] {
        &self.episodes
    }

    /// Run ids in first-seen order.
    pub fn available_runs(&self) -> Vec<String> {
        distinct(&self.records, |r| r.run_id.as_str())
    }

    /// Intersection ids in first-seen order.
    pub fn available_intersections(&self) -> Vec<String> {
        distinct(&self.records, |r| r.intersection_id.as_str())
    }

    pub fn max_cycle(&self) -> u32 {
        self.records.iter().map(|r| r.cycle_id).max().unwrap_or(0)
    }

    /// Every run, every intersection, the full cycle range.
    pub fn default_selection(&self) -> Selection {
        Selection::everything(self.available_runs(), self.max_cycle())
    }

    pub fn filter(&self, selection: &Selection) -> Vec<CycleRecord> {
        filter_records(&self.records, selection)
    }

    /// Most recent episode per intersection, ties going to the first seen.
    pub fn latest_episodes(&self) -> Vec<&TrainingEpisode> {
        latest_per_group(
            &self.episodes,
            |ep| {
                ep.intersection_id
                    .clone()
                    .unwrap_or_else(|| self.config.default_intersection.clone())
            },
            |ep| ep.episode_number,
        )
    }

    /// Research objectives over the loaded episodes.
    pub fn objectives(&self) -> ObjectiveReport {
        evaluate_dataset(&self.episodes, &self.config)
    }

    /// Computes the full view for `selection`.
    ///
    /// KPIs describe the latest cycle in the filtered set and are grouped by
    /// run when more than one run is selected. The time series and breakdown
    /// span the whole filtered set.
    #[instrument(skip(self, selection), fields(runs = selection.runs.len()))]
    pub fn view(&self, selection: &Selection, metric: Metric, category: Category) -> DashboardView {
        let filtered = self.filter(selection);
        let representative = representative_rows(&filtered);

        let latest_cycle = representative.iter().map(|r| r.cycle_id).max();
        let latest: Vec<CycleRecord> = representative
            .into_iter()
            .filter(|r| Some(r.cycle_id) == latest_cycle)
            .collect();

        let kpis = compute(&latest, selection.runs.len() > 1);
        let comparisons = match &kpis {
            KpiView::ByRun(by_run) => self.compare_runs(
                by_run.get(&self.config.learned_run_name),
                by_run.get(&self.config.baseline_run_name),
            ),
            KpiView::Overall(_) => Vec::new(),
        };

        debug!(
            filtered = filtered.len(),
            latest = latest.len(),
            ?latest_cycle,
            comparisons = comparisons.len(),
            "Dashboard view computed"
        );

        DashboardView {
            selection: selection.clone(),
            total_records: self.records.len(),
            filtered_records: filtered.len(),
            latest_cycle,
            kpis,
            comparisons,
            time_series: build_time_series(&filtered, metric),
            breakdown: build_breakdown(&filtered, category, metric, None),
        }
    }

    fn compare_runs(
        &self,
        learned: Option<&KpiData>,
        baseline: Option<&KpiData>,
    ) -> Vec<ComparativeMetric> {
        let (Some(l), Some(b)) = (learned, baseline) else {
            return Vec::new();
        };
        let targets = &self.config.targets;

        vec![
            ComparativeMetric::evaluate(
                "passenger_throughput",
                l.avg_passenger_throughput,
                b.avg_passenger_throughput,
                Orientation::HigherIsBetter,
                targets.passenger_throughput_pct,
            ),
            ComparativeMetric::evaluate(
                "waiting_time",
                l.avg_waiting_time,
                b.avg_waiting_time,
                Orientation::LowerIsBetter,
                targets.waiting_time_pct,
            ),
            ComparativeMetric::evaluate(
                "public_vehicle_throughput",
                l.avg_public_vehicle_throughput,
                b.avg_public_vehicle_throughput,
                Orientation::HigherIsBetter,
                targets.public_vehicle_pct,
            ),
        ]
    }
}
