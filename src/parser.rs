//! Readers for the four input shapes: flat cycle-record CSV, episode JSON, raw
//! validation JSON and training-log JSON.
//!
//! CSV numerics are lenient. Blank or unparseable cells read as missing (and
//! therefore 0) rather than failing the whole file. Column problems are caught
//! up front by [`inspect_schema`].

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::episode::TrainingEpisode;
use crate::record::CycleRecord;
use crate::training::TrainingLog;
use crate::validation::ValidationEntry;

/// Columns a record CSV must have.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "run_id",
    "intersection_id",
    "cycle_id",
    "start_time",
    "lane_id",
    "total_count",
    "total_pcu",
    "occupancy",
    "total_queue",
    "throughput_pcu",
];

/// Columns understood beyond the required ones.
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "run_kind",
    "passenger_throughput",
    "passenger_waiting_time",
    "public_vehicle_count",
    "public_vehicle_throughput",
    "public_vehicle_travel_time",
    "public_vehicle_delay",
    "tsp_activations",
    "green_extension_time",
    "coordination_score",
    "overall_vehicle_delay",
    "vehicle_classification_accuracy",
    "waiting_time",
    "avg_speed",
    "completed_trips",
    "cars",
    "motorcycles",
    "trucks",
    "tricycles",
    "jeepneys",
    "modern_jeepneys",
    "buses",
    "reward",
    "phase_index",
    "timestamp_step",
];

/// Result of checking a CSV header before any row is parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaReport {
    pub has_rows: bool,
    pub missing_columns: Vec<String>,
    pub unexpected_columns: Vec<String>,
}

impl SchemaReport {
    /// Valid when there is data and no required column is missing.
    /// Unexpected columns are reported but tolerated.
    pub fn is_valid(&self) -> bool {
        self.has_rows && self.missing_columns.is_empty()
    }

    pub fn from_headers<S: AsRef<str>>(headers: &[S], has_rows: bool) -> Self {
        let present: HashSet<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();
        let known: HashSet<&str> = REQUIRED_COLUMNS
            .iter()
            .chain(OPTIONAL_COLUMNS)
            .copied()
            .collect();

        SchemaReport {
            has_rows,
            missing_columns: REQUIRED_COLUMNS
                .iter()
                .filter(|c| !present.contains(*c))
                .map(|c| c.to_string())
                .collect(),
            unexpected_columns: headers
                .iter()
                .map(|h| h.as_ref().trim())
                .filter(|h| !known.contains(h))
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Reads just the header (and whether any row follows) of a record CSV.
pub fn inspect_schema(bytes: &[u8]) -> Result<SchemaReport> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = rdr
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let has_rows = rdr.records().next().is_some();

    let report = SchemaReport::from_headers(&headers, has_rows);
    if !report.is_valid() {
        warn!(
            missing = ?report.missing_columns,
            has_rows = report.has_rows,
            "Record CSV failed schema check"
        );
    }
    Ok(report)
}

/// Row as it appears in a CSV file, before run classification.
#[derive(Debug, Deserialize)]
struct CsvRow {
    run_id: String,
    intersection_id: String,
    #[serde(default, deserialize_with = "lenient")]
    cycle_id: Option<u32>,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    lane_id: String,

    #[serde(default, deserialize_with = "lenient")]
    total_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_pcu: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    occupancy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_queue: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    throughput_pcu: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    passenger_throughput: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    passenger_waiting_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    public_vehicle_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    public_vehicle_throughput: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    public_vehicle_travel_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    public_vehicle_delay: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    tsp_activations: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    green_extension_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    coordination_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    overall_vehicle_delay: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    vehicle_classification_accuracy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    waiting_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    avg_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    completed_trips: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    cars: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    motorcycles: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    trucks: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    tricycles: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    jeepneys: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    modern_jeepneys: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    buses: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    reward: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    phase_index: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    timestamp_step: Option<u32>,
}

/// Parses a cell, treating blanks and garbage as missing.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

/// Like [`lenient`], but `NaN` and infinities also read as missing.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, f64>(deserializer)?.filter(|v| v.is_finite()))
}

impl CsvRow {
    fn into_record(self, config: &PipelineConfig) -> CycleRecord {
        let n = |v: Option<f64>| v.unwrap_or(0.0);
        CycleRecord {
            run_kind: config.run_kind_for(&self.run_id),
            run_id: self.run_id,
            intersection_id: self.intersection_id,
            cycle_id: self.cycle_id.unwrap_or(0),
            start_time: self.start_time,
            lane_id: self.lane_id,
            total_count: self.total_count,
            total_pcu: n(self.total_pcu),
            occupancy: self.occupancy.map(|o| o.clamp(0.0, 1.0)),
            total_queue: n(self.total_queue),
            throughput_pcu: n(self.throughput_pcu),
            passenger_throughput: n(self.passenger_throughput),
            passenger_waiting_time: n(self.passenger_waiting_time),
            public_vehicle_count: n(self.public_vehicle_count),
            public_vehicle_throughput: n(self.public_vehicle_throughput),
            public_vehicle_travel_time: n(self.public_vehicle_travel_time),
            public_vehicle_delay: n(self.public_vehicle_delay),
            tsp_activations: n(self.tsp_activations),
            green_extension_time: n(self.green_extension_time),
            coordination_score: n(self.coordination_score),
            overall_vehicle_delay: n(self.overall_vehicle_delay),
            vehicle_classification_accuracy: n(self.vehicle_classification_accuracy),
            waiting_time: n(self.waiting_time),
            avg_speed: n(self.avg_speed),
            completed_trips: n(self.completed_trips),
            cars: n(self.cars),
            motorcycles: n(self.motorcycles),
            trucks: n(self.trucks),
            tricycles: n(self.tricycles),
            jeepneys: n(self.jeepneys),
            modern_jeepneys: n(self.modern_jeepneys),
            buses: n(self.buses),
            reward: self.reward,
            phase_index: self.phase_index,
            timestamp_step: self.timestamp_step,
        }
    }
}

/// Reads cycle records from CSV bytes. Run kinds are classified with `config`.
///
/// # Errors
///
/// Returns an error if the CSV is structurally broken (e.g. ragged rows or a
/// missing `run_id`/`intersection_id` column). Call [`inspect_schema`] first
/// for a friendlier report.
pub fn parse_records(bytes: &[u8], config: &PipelineConfig) -> Result<Vec<CycleRecord>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();

    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad record on data line {}", line + 1))?;
        records.push(row.into_record(config));
    }

    debug!(records = records.len(), "Parsed record CSV");
    Ok(records)
}

/// Decodes a JSON array of [`TrainingEpisode`]s.
pub fn parse_episodes(bytes: &[u8]) -> Result<Vec<TrainingEpisode>> {
    let episodes: Vec<TrainingEpisode> =
        serde_json::from_slice(bytes).context("failed to decode episode JSON")?;
    debug!(episodes = episodes.len(), "Parsed episode JSON");
    Ok(episodes)
}

/// Decodes a JSON array of raw validation entries.
pub fn parse_validation(bytes: &[u8]) -> Result<Vec<ValidationEntry>> {
    let entries: Vec<ValidationEntry> =
        serde_json::from_slice(bytes).context("failed to decode validation JSON")?;
    debug!(entries = entries.len(), "Parsed validation JSON");
    Ok(entries)
}

/// Decodes a training-log JSON object.
pub fn parse_training(bytes: &[u8]) -> Result<TrainingLog> {
    let log: TrainingLog =
        serde_json::from_slice(bytes).context("failed to decode training log JSON")?;
    debug!(results = log.training_results.len(), "Parsed training log JSON");
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::kpi::compute_kpis;
    use crate::record::RunKind;

    const HEADER: &str = "run_id,intersection_id,cycle_id,start_time,lane_id,total_count,total_pcu,occupancy,total_queue,throughput_pcu";

    #[test]
    fn test_schema_valid() {
        let csv = format!("{HEADER}\nFixed Time,Ecoland,1,08:00:00,Lane_N,20,24,0.5,8,180\n");
        let report = inspect_schema(csv.as_bytes()).unwrap();
        assert!(report.is_valid());
        assert!(report.missing_columns.is_empty());
    }

    #[test]
    fn test_schema_reports_missing_and_unexpected() {
        let csv = "run_id,intersection_id,cycle_id,colour\nA,X,1,red\n";
        let report = inspect_schema(csv.as_bytes()).unwrap();

        assert!(!report.is_valid());
        assert!(report.missing_columns.contains(&"occupancy".to_string()));
        assert!(!report.missing_columns.contains(&"run_id".to_string()));
        assert_eq!(report.unexpected_columns, vec!["colour"]);
    }

    #[test]
    fn test_schema_no_rows_is_invalid() {
        let report = inspect_schema(format!("{HEADER}\n").as_bytes()).unwrap();
        assert!(!report.has_rows);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_parse_records_lenient_numbers() {
        let csv = format!(
            "{HEADER},reward\nD3QN Multi Agent,Ecoland,3,08:00:00,Aggregate,,24,n/a,8,180,1.25\n"
        );

        let records = parse_records(csv.as_bytes(), &PipelineConfig::default()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.cycle_id, 3);
        assert_eq!(r.total_count, None);
        assert_eq!(r.occupancy, None);
        assert_eq!(r.throughput_pcu, 180.0);
        assert_eq!(r.passenger_throughput, 0.0);
        assert_eq!(r.reward, Some(1.25));
        assert_eq!(r.run_kind, RunKind::Learned);
    }

    #[test]
    fn test_parse_records_non_finite_reads_as_missing() {
        let csv = format!(
            "{HEADER},reward\nD3QN Multi Agent,Ecoland,1,08:00:00,Aggregate,10,NaN,NaN,-inf,inf,nan\n"
        );

        let records = parse_records(csv.as_bytes(), &PipelineConfig::default()).unwrap();
        let r = &records[0];

        assert_eq!(r.occupancy, None);
        assert_eq!(r.total_pcu, 0.0);
        assert_eq!(r.total_queue, 0.0);
        assert_eq!(r.throughput_pcu, 0.0);
        assert_eq!(r.reward, None);

        let kpi = compute_kpis(&records);
        assert_eq!(kpi.avg_occupancy, 0.0);
        assert_eq!(kpi.avg_throughput, 0.0);
        assert!(kpi.avg_total_queue.is_finite());
    }

    #[test]
    fn test_parse_records_classifies_baseline_and_clamps() {
        let csv = format!("{HEADER}\nFixed Time,Ecoland,1,08:00:00,Lane_N,20,24,1.7,8,180\n");

        let records = parse_records(csv.as_bytes(), &PipelineConfig::default()).unwrap();

        assert_eq!(records[0].run_kind, RunKind::Baseline);
        assert_eq!(records[0].occupancy, Some(1.0));
    }

    #[test]
    fn test_parse_episodes_invalid_json() {
        assert!(parse_episodes(b"{not json").is_err());
    }

    #[test]
    fn test_parse_validation_accepts_total_vehicles_alias() {
        let json = br#"[{"episode": 1, "d3qn": {"passenger_throughput": 10, "total_vehicles": 5}}]"#;
        let entries = parse_validation(json).unwrap();
        assert_eq!(entries[0].d3qn.as_ref().unwrap().vehicles, 5.0);
        assert!(entries[0].fixed_time.is_none());
    }

    #[test]
    fn test_parse_training_log() {
        let json = br#"{"experiment_name": "lstm", "episode_count": 10,
            "training_results": [{"episode": 1, "scenario": "Day 1, Cycle 2", "vehicles": 100}]}"#;
        let log = parse_training(json).unwrap();
        assert_eq!(log.experiment_name.as_deref(), Some("lstm"));
        assert_eq!(log.training_results[0].vehicles, 100.0);
        assert_eq!(log.training_results[0].avg_speed, None);
    }
}
