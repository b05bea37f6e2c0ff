//! Training/validation episode records as produced by the simulation side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseType {
    Offline,
    #[default]
    Online,
}

/// Vehicles processed during an episode, by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleBreakdown {
    pub cars: f64,
    pub motorcycles: f64,
    pub trucks: f64,
    pub tricycles: f64,
    pub jeepneys: f64,
    pub modern_jeepneys: f64,
    pub buses: f64,
}

/// Passengers carried during an episode, by vehicle type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassengerBreakdown {
    pub car_passengers: f64,
    pub motorcycle_passengers: f64,
    pub truck_passengers: f64,
    pub tricycle_passengers: f64,
    pub jeepney_passengers: f64,
    pub modern_jeepney_passengers: f64,
    pub bus_passengers: f64,
}

/// Average passengers per vehicle, used to estimate [`PassengerBreakdown`].
pub const CAR_OCCUPANCY: f64 = 1.3;
pub const MOTORCYCLE_OCCUPANCY: f64 = 1.4;
pub const TRUCK_OCCUPANCY: f64 = 1.1;
pub const TRICYCLE_OCCUPANCY: f64 = 2.5;
pub const JEEPNEY_OCCUPANCY: f64 = 14.0;
pub const MODERN_JEEPNEY_OCCUPANCY: f64 = 22.0;
pub const BUS_OCCUPANCY: f64 = 35.0;

impl PassengerBreakdown {
    /// Estimates passengers from vehicle counts using fixed per-type occupancy.
    pub fn estimate(v: &VehicleBreakdown) -> Self {
        PassengerBreakdown {
            car_passengers: (v.cars * CAR_OCCUPANCY).round(),
            motorcycle_passengers: (v.motorcycles * MOTORCYCLE_OCCUPANCY).round(),
            truck_passengers: (v.trucks * TRUCK_OCCUPANCY).round(),
            tricycle_passengers: (v.tricycles * TRICYCLE_OCCUPANCY).round(),
            jeepney_passengers: (v.jeepneys * JEEPNEY_OCCUPANCY).round(),
            modern_jeepney_passengers: (v.modern_jeepneys * MODERN_JEEPNEY_OCCUPANCY).round(),
            bus_passengers: (v.buses * BUS_OCCUPANCY).round(),
        }
    }
}

/// One simulated episode with its headline metrics.
///
/// Numeric fields default to 0 when absent from the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingEpisode {
    pub experiment_id: String,
    pub episode_number: u32,
    pub phase_type: PhaseType,
    pub scenario_name: String,
    pub scenario_day: String,
    pub scenario_cycle: u32,
    pub intersection_id: Option<String>,

    pub total_reward: f64,
    pub avg_loss: f64,
    pub epsilon_value: f64,
    pub steps_completed: u32,
    pub episode_duration_seconds: f64,

    pub vehicles_served: f64,
    pub completed_trips: f64,
    pub passenger_throughput: f64,
    pub avg_waiting_time: f64,
    pub avg_queue_length: f64,
    pub avg_speed: f64,

    pub jeepneys_processed: f64,
    pub buses_processed: f64,
    pub pt_passenger_throughput: f64,

    pub memory_size: u64,
    pub timestamp: Option<DateTime<Utc>>,

    pub vehicle_breakdown: Option<VehicleBreakdown>,
    pub passenger_breakdown: Option<PassengerBreakdown>,
}

impl TrainingEpisode {
    /// Jeepneys plus buses: the vehicles that receive signal priority.
    pub fn public_vehicles(&self) -> f64 {
        self.jeepneys_processed + self.buses_processed
    }
}
