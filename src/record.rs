//! The flat per-cycle observation consumed by every analyzer.

use serde::{Deserialize, Serialize};

/// Lane sentinel for a row that already represents a whole intersection.
pub const AGGREGATE_LANE: &str = "Aggregate";

/// Intersection selector meaning "do not filter by intersection".
/// Never stored on a record.
pub const ALL_INTERSECTIONS: &str = "all";

/// Which side of the comparison a run belongs to.
///
/// Set once at ingestion so nothing downstream has to re-derive it from the
/// run name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// The fixed-time signal plan.
    Baseline,
    /// The reinforcement-learning controller.
    #[default]
    Learned,
}

impl RunKind {
    /// Classifies a run identifier by looking for the baseline marker or the
    /// baseline run name inside it (case-insensitive).
    pub fn classify(run_id: &str, baseline_marker: &str, baseline_run_name: &str) -> Self {
        let id = run_id.to_lowercase();
        let marker = baseline_marker.to_lowercase();
        let name = baseline_run_name.to_lowercase();
        if (!marker.is_empty() && id.contains(&marker)) || (!name.is_empty() && id.contains(&name)) {
            RunKind::Baseline
        } else {
            RunKind::Learned
        }
    }

    pub fn is_baseline(self) -> bool {
        matches!(self, RunKind::Baseline)
    }
}

/// One observation for a run at an intersection during one signal cycle.
///
/// `occupancy` and `total_count` stay optional because incomplete rows are
/// filtered on them. Every other numeric field reads as 0 when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleRecord {
    pub run_id: String,
    pub run_kind: RunKind,
    pub intersection_id: String,
    pub cycle_id: u32,
    pub start_time: String,
    pub lane_id: String,

    pub total_count: Option<u64>,
    pub total_pcu: f64,
    pub occupancy: Option<f64>,
    pub total_queue: f64,
    pub throughput_pcu: f64,

    // passenger-centric
    pub passenger_throughput: f64,
    pub passenger_waiting_time: f64,

    // public vehicles
    pub public_vehicle_count: f64,
    pub public_vehicle_throughput: f64,
    pub public_vehicle_travel_time: f64,
    pub public_vehicle_delay: f64,

    // transit signal priority
    pub tsp_activations: f64,
    pub green_extension_time: f64,

    pub coordination_score: f64,
    pub overall_vehicle_delay: f64,
    pub vehicle_classification_accuracy: f64,

    pub waiting_time: f64,
    pub avg_speed: f64,
    pub completed_trips: f64,

    // vehicle types
    pub cars: f64,
    pub motorcycles: f64,
    pub trucks: f64,
    pub tricycles: f64,
    pub jeepneys: f64,
    pub modern_jeepneys: f64,
    pub buses: f64,

    pub reward: Option<f64>,
    pub phase_index: Option<u32>,
    pub timestamp_step: Option<u32>,
}

impl CycleRecord {
    pub fn is_aggregate(&self) -> bool {
        self.lane_id == AGGREGATE_LANE
    }

    /// True when the fields required by the "hide incomplete" toggle are present.
    pub fn is_complete(&self) -> bool {
        self.occupancy.is_some() && self.total_count.is_some()
    }

    /// Per-type vehicle counts as `(label, count)` pairs, in display order.
    pub fn vehicle_counts(&self) -> [(&'static str, f64); 7] {
        [
            ("cars", self.cars),
            ("motorcycles", self.motorcycles),
            ("trucks", self.trucks),
            ("tricycles", self.tricycles),
            ("jeepneys", self.jeepneys),
            ("modern_jeepneys", self.modern_jeepneys),
            ("buses", self.buses),
        ]
    }
}

/// Numeric record fields that can be charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalCount,
    TotalPcu,
    Occupancy,
    TotalQueue,
    ThroughputPcu,
    PassengerThroughput,
    PassengerWaitingTime,
    PublicVehicleCount,
    PublicVehicleThroughput,
    PublicVehicleTravelTime,
    PublicVehicleDelay,
    TspActivations,
    GreenExtensionTime,
    CoordinationScore,
    OverallVehicleDelay,
    WaitingTime,
    AvgSpeed,
    CompletedTrips,
    Reward,
}

impl Metric {
    /// Reads the metric from a record, with missing values as 0.
    pub fn value(self, r: &CycleRecord) -> f64 {
        match self {
            Metric::TotalCount => r.total_count.unwrap_or(0) as f64,
            Metric::TotalPcu => r.total_pcu,
            Metric::Occupancy => r.occupancy.unwrap_or(0.0),
            Metric::TotalQueue => r.total_queue,
            Metric::ThroughputPcu => r.throughput_pcu,
            Metric::PassengerThroughput => r.passenger_throughput,
            Metric::PassengerWaitingTime => r.passenger_waiting_time,
            Metric::PublicVehicleCount => r.public_vehicle_count,
            Metric::PublicVehicleThroughput => r.public_vehicle_throughput,
            Metric::PublicVehicleTravelTime => r.public_vehicle_travel_time,
            Metric::PublicVehicleDelay => r.public_vehicle_delay,
            Metric::TspActivations => r.tsp_activations,
            Metric::GreenExtensionTime => r.green_extension_time,
            Metric::CoordinationScore => r.coordination_score,
            Metric::OverallVehicleDelay => r.overall_vehicle_delay,
            Metric::WaitingTime => r.waiting_time,
            Metric::AvgSpeed => r.avg_speed,
            Metric::CompletedTrips => r.completed_trips,
            Metric::Reward => r.reward.unwrap_or(0.0),
        }
    }
}
