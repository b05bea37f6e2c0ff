//! Turns a training run log into learned-controller episodes.
//!
//! Training rows only carry a handful of measured values. Metrics the run did
//! not record (a missing or zero value) are estimated from what it did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PipelineConfig;
use crate::episode::{PassengerBreakdown, PhaseType, TrainingEpisode, VehicleBreakdown};

/// Episode count assumed when the log does not state one.
pub const DEFAULT_EPISODE_COUNT: u32 = 300;

/// One training episode as logged by the trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingResult {
    pub episode: u32,
    /// `"Day X, Cycle Y"`.
    pub scenario: String,
    pub reward: f64,
    pub steps: u32,
    pub time_minutes: f64,
    pub avg_loss: f64,
    pub epsilon: f64,
    pub vehicles: f64,
    pub completed_trips: f64,
    pub passenger_throughput: f64,
    pub memory_size: u64,

    pub avg_waiting_time: Option<f64>,
    pub avg_queue_length: Option<f64>,
    pub avg_speed: Option<f64>,
    pub jeepneys_processed: Option<f64>,
    pub buses_processed: Option<f64>,
    pub pt_passenger_throughput: Option<f64>,
    pub cars_processed: Option<f64>,
    pub motorcycles_processed: Option<f64>,
    pub trucks_processed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingLog {
    pub experiment_name: Option<String>,
    pub episode_count: Option<u32>,
    pub compilation_timestamp: Option<DateTime<Utc>>,
    pub training_results: Vec<TrainingResult>,
}

impl TrainingLog {
    /// Episodes up to and including this number ran in the offline phase.
    pub fn offline_threshold(&self) -> u32 {
        let count = self
            .episode_count
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_EPISODE_COUNT);
        count * 2 / 5
    }
}

/// One learned episode per training row, in log order.
pub fn assemble_training(log: &TrainingLog, config: &PipelineConfig) -> Vec<TrainingEpisode> {
    let threshold = log.offline_threshold();
    let experiment_id = log
        .experiment_name
        .clone()
        .unwrap_or_else(|| config.experiment_name.clone());

    let episodes: Vec<TrainingEpisode> = log
        .training_results
        .iter()
        .map(|result| {
            let mut ep = episode_from(result, threshold);
            ep.experiment_id = experiment_id.clone();
            ep.intersection_id = Some(config.default_intersection.clone());
            ep.timestamp = log.compilation_timestamp;
            ep
        })
        .collect();

    let offline = episodes
        .iter()
        .filter(|ep| ep.phase_type == PhaseType::Offline)
        .count();
    info!(
        episodes = episodes.len(),
        offline,
        threshold,
        "Assembled training episodes"
    );

    episodes
}

/// Splits `"Day X, Cycle Y"` into `("X", Y)`. Missing parts default to day
/// `"1"` and cycle 1.
pub fn parse_scenario(scenario: &str) -> (String, u32) {
    let mut parts = scenario.split(',').map(str::trim);
    let day = parts.next().filter(|s| !s.is_empty()).unwrap_or("Day 1");
    let cycle = parts.next().filter(|s| !s.is_empty()).unwrap_or("Cycle 1");

    let digits: String = cycle
        .replace("Cycle ", "")
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let cycle = digits.parse().ok().filter(|&n| n > 0).unwrap_or(1);

    (day.replace("Day ", ""), cycle)
}

/// A recorded value, unless it is missing or zero.
fn recorded(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

fn episode_from(r: &TrainingResult, offline_threshold: u32) -> TrainingEpisode {
    let (scenario_day, scenario_cycle) = parse_scenario(&r.scenario);
    let trips = r.completed_trips;

    let avg_speed = recorded(r.avg_speed).unwrap_or_else(|| {
        if r.vehicles > 0.0 {
            25.0 + trips / r.vehicles * 10.0
        } else {
            25.0
        }
    });

    // breakdowns only exist for runs that logged per-type counts
    let vehicle_breakdown = r.cars_processed.map(|cars| VehicleBreakdown {
        cars,
        motorcycles: r.motorcycles_processed.unwrap_or(0.0),
        trucks: r.trucks_processed.unwrap_or(0.0),
        tricycles: 0.0,
        jeepneys: r.jeepneys_processed.unwrap_or(0.0),
        modern_jeepneys: 0.0,
        buses: r.buses_processed.unwrap_or(0.0),
    });

    TrainingEpisode {
        episode_number: r.episode,
        phase_type: if r.episode <= offline_threshold {
            PhaseType::Offline
        } else {
            PhaseType::Online
        },
        scenario_name: format!("Day {scenario_day}"),
        scenario_day,
        scenario_cycle,

        total_reward: r.reward,
        avg_loss: r.avg_loss,
        epsilon_value: r.epsilon,
        steps_completed: r.steps,
        episode_duration_seconds: (r.time_minutes * 60.0).round(),

        vehicles_served: r.vehicles,
        completed_trips: trips,
        passenger_throughput: r.passenger_throughput,
        avg_waiting_time: recorded(r.avg_waiting_time)
            .unwrap_or_else(|| (60.0 - r.passenger_throughput / 150.0).max(10.0)),
        avg_queue_length: recorded(r.avg_queue_length)
            .unwrap_or_else(|| ((r.vehicles - trips) / 10.0).max(1.0)),
        avg_speed,

        jeepneys_processed: recorded(r.jeepneys_processed)
            .unwrap_or_else(|| (trips * 0.15).floor()),
        buses_processed: recorded(r.buses_processed).unwrap_or_else(|| (trips * 0.08).floor()),
        pt_passenger_throughput: recorded(r.pt_passenger_throughput)
            .unwrap_or(r.passenger_throughput * 0.85),

        memory_size: r.memory_size,
        passenger_breakdown: vehicle_breakdown.as_ref().map(PassengerBreakdown::estimate),
        vehicle_breakdown,
        ..Default::default()
    }
}
