//! fuzzdrive - Fuzzy Driving Controller
//!
//! A Mamdani fuzzy-logic controller that turns crisp driving measurements
//! into a crisp action intensity and a discrete driving action.
//!
//! # Architecture
//!
//! - [`fuzzy::VariableRegistry`] - linguistic variables and their membership functions
//! - [`fuzzy::RuleBase`] - validated AND/OR rules over a frozen registry
//! - [`fuzzy::infer`] - min/max firing, max-aggregation and centroid defuzzification
//! - [`fuzzy::ActionBands`] - labeled partition of the output range
//! - [`fuzzy::Engine`] - immutable, thread-safe facade over all of the above
//!
//! # Features
//!
//! - Triangular and trapezoidal membership functions
//! - Textual rules (`IF distance IS close AND speed IS high THEN action IS brake`)
//! - Rule weights and configurable defuzzification resolution
//! - TOML configuration with a built-in driving controller
//! - Parallel batch evaluation and driving log replay
//!
//! # Example
//!
//! ```rust,ignore
//! use fuzzdrive::{ControllerConfig, CrispInputs};
//!
//! let engine = ControllerConfig::driving().build()?;
//! let decision = engine.evaluate(
//!     &CrispInputs::new()
//!         .with("distance", 10.0)
//!         .with("speed", 90.0)
//!         .with("road_condition", 1.0)
//!         .with("throttle", 0.1),
//! )?;
//! assert_eq!(decision.label, "brake");
//! ```

pub mod config;
pub mod error;
pub mod fuzzy;
pub mod parser;
pub mod simulation;

// Re-export the fuzzy model
pub use fuzzy::{
    classify, evaluate, infer, infer_detailed, ActionBand, ActionBands, Antecedent, Closed, Consequent, CrispInputs,
    Degree, Engine, Evaluation, Inference, LinguisticVariable, MembershipFunction, Rule, RuleBase, RuleBaseBuilder,
    Universe, VariableRegistry,
};

// Re-export rule text parsing
pub use parser::{parse_antecedent, parse_rule, RuleSyntaxError};

// Re-export configuration
pub use config::{ControllerConfig, LogLevel, OutputFormat};

// Re-export error types
pub use error::{EngineError, EngineResult, ErrorCode};

// Re-export simulation
pub use simulation::{
    render_bar_chart, ActionCounts, DistancePolicy, DrivingRecord, FixedDistance, OnRowError, SeededUniformDistance,
    Simulation, SimulationReport,
};
