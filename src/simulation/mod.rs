//! Driving log simulation
//!
//! Replays a driving log through the controller:
//! - speed is converted with the configured factor (m/s to km/h)
//! - road condition comes from the log or a seeded draw
//! - distance to the obstacle comes from a [`DistancePolicy`]
//!
//! Records are evaluated in parallel; outcomes, counts and failures are
//! reported in record order.

pub mod chart;
pub mod dataset;

pub use chart::render_bar_chart;
pub use dataset::{assign_road_conditions, load_driving_log, parse_driving_log, DrivingRecord};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::fuzzy::{CrispInputs, Engine};

pub const DISTANCE: &str = "distance";
pub const SPEED: &str = "speed";
pub const ROAD_CONDITION: &str = "road_condition";
pub const THROTTLE: &str = "throttle";

// ============================================================================
// Distance Policies
// ============================================================================

/// Supplies the distance to the obstacle for each record
pub trait DistancePolicy {
    fn distance(&self, index: usize, record: &DrivingRecord) -> f64;
}

/// Uniform draw in `[min, max]`, fixed per record index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeededUniformDistance {
    seed: u64,
    min: f64,
    max: f64,
}

impl SeededUniformDistance {
    pub fn new(seed: u64, min: f64, max: f64) -> EngineResult<Self> {
        crate::engine_ensure!(
            min.is_finite() && max.is_finite() && min <= max,
            crate::error::ErrorCode::ConfigError,
            "distance range [{}, {}] is invalid",
            min,
            max
        );
        Ok(Self { seed, min, max })
    }
}

impl DistancePolicy for SeededUniformDistance {
    fn distance(&self, index: usize, _record: &DrivingRecord) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        rng.gen_range(self.min..=self.max)
    }
}

/// The same distance for every record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDistance(pub f64);

impl DistancePolicy for FixedDistance {
    fn distance(&self, _index: usize, _record: &DrivingRecord) -> f64 {
        self.0
    }
}

impl<F> DistancePolicy for F
where
    F: Fn(usize, &DrivingRecord) -> f64 + Send + Sync,
{
    fn distance(&self, index: usize, record: &DrivingRecord) -> f64 {
        self(index, record)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// What to do with a record that fails to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OnRowError {
    /// Record the failure and continue
    #[default]
    Skip,
    /// Stop at the first failure
    Abort,
    /// Count the record under this label
    Default(String),
}

/// Count per action label, in band declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionCounts {
    counts: IndexMap<String, usize>,
}

impl ActionCounts {
    /// Zero counts for each label
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            counts: labels.into_iter().map(|l| (l.to_string(), 0)).collect(),
        }
    }

    pub fn record(&mut self, label: &str) {
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Result of one record
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// 1-based record number
    pub row: usize,
    pub inputs: CrispInputs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
}

impl RowOutcome {
    /// `Row N: Action = label (value)`
    pub fn summary(&self) -> String {
        match (&self.label, self.output, &self.error) {
            (Some(label), Some(output), _) => format!("Row {}: Action = {} ({:.2})", self.row, label, output),
            (Some(label), None, Some(err)) => {
                format!("Row {}: Action = {} (default, {})", self.row, label, err.code.description())
            }
            (_, _, Some(err)) => format!("Row {}: skipped ({})", self.row, err.message),
            _ => format!("Row {}: no result", self.row),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub rows: Vec<RowOutcome>,
    pub counts: ActionCounts,
    /// Records that failed to evaluate, including defaulted ones
    pub failures: usize,
}

// ============================================================================
// Simulation
// ============================================================================

/// Runs records through an engine
#[derive(Debug, Clone)]
pub struct Simulation {
    speed_factor: f64,
    on_error: OnRowError,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            speed_factor: 3.6,
            on_error: OnRowError::Skip,
        }
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed_factor(mut self, factor: f64) -> Self {
        self.speed_factor = factor;
        self
    }

    pub fn with_on_error(mut self, policy: OnRowError) -> Self {
        self.on_error = policy;
        self
    }

    /// Inputs for one record; a missing road condition is left out
    pub fn inputs_for(&self, index: usize, record: &DrivingRecord, policy: &dyn DistancePolicy) -> CrispInputs {
        let mut inputs = CrispInputs::new()
            .with(DISTANCE, policy.distance(index, record))
            .with(SPEED, record.speed * self.speed_factor);
        if let Some(score) = record.road_condition {
            inputs.insert(ROAD_CONDITION, score);
        }
        inputs.insert(THROTTLE, record.throttle);
        inputs
    }

    /// Evaluate every record and tally the actions
    ///
    /// Under [`OnRowError::Abort`] the first failing record (in record order)
    /// is returned as the error, with its row number in the context.
    pub fn run(
        &self,
        engine: &Engine,
        records: &[DrivingRecord],
        policy: &dyn DistancePolicy,
    ) -> EngineResult<SimulationReport> {
        let inputs: Vec<CrispInputs> = records
            .iter()
            .enumerate()
            .map(|(i, record)| self.inputs_for(i, record, policy))
            .collect();
        let results = engine.evaluate_batch(&inputs);

        let mut counts = ActionCounts::new(engine.bands().labels());
        let mut rows = Vec::with_capacity(records.len());
        let mut failures = 0;

        for (index, (inputs, result)) in inputs.into_iter().zip(results).enumerate() {
            let row = index + 1;
            match result {
                Ok(eval) => {
                    counts.record(&eval.label);
                    rows.push(RowOutcome {
                        row,
                        inputs,
                        output: Some(eval.output),
                        label: Some(eval.label),
                        error: None,
                    });
                }
                Err(err) => {
                    failures += 1;
                    warn!(row, code = err.code.code(), "record failed: {}", err.message);
                    let label = match &self.on_error {
                        OnRowError::Abort => return Err(err.with_context("row", row.to_string())),
                        OnRowError::Skip => None,
                        OnRowError::Default(label) => {
                            counts.record(label);
                            Some(label.clone())
                        }
                    };
                    rows.push(RowOutcome {
                        row,
                        inputs,
                        output: None,
                        label,
                        error: Some(err),
                    });
                }
            }
        }

        info!(records = rows.len(), failures, "simulation finished");
        Ok(SimulationReport { rows, counts, failures })
    }
}
