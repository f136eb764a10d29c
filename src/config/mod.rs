//! Configuration System for fuzzdrive
//!
//! Provides a flexible configuration system supporting:
//! - TOML configuration files
//! - Environment variable overrides
//! - Declarative variables, rules and action bands
//! - Multiple config file locations
//!
//! # Configuration File Locations
//!
//! Configuration files are searched in order (first found wins):
//! 1. `./fuzzdrive.toml` - Project-local configuration
//! 2. `~/.config/fuzzdrive/config.toml` - User configuration (XDG)
//! 3. `~/.fuzzdrive/config.toml` - User configuration (legacy)
//! 4. `/etc/fuzzdrive/config.toml` - System-wide configuration
//!
//! With no file found, the built-in driving controller is used. Sections
//! omitted from a file also fall back to the driving controller.
//!
//! # Environment Variables
//!
//! - `FUZZDRIVE_LOG_LEVEL` - Logging verbosity (quiet, normal, verbose, debug)
//! - `FUZZDRIVE_FORMAT` - Output format (text, json)
//! - `FUZZDRIVE_RESOLUTION` - Defuzzification sampling step
//! - `FUZZDRIVE_ROAD_SEED` - Seed for derived road conditions
//! - `FUZZDRIVE_DISTANCE_SEED` - Seed for simulated distances
//!
//! # Example Configuration
//!
//! ```toml
//! [general]
//! log_level = "verbose"
//! format = "json"
//!
//! [inference]
//! resolution = 0.5
//!
//! [[variables]]
//! name = "speed"
//! min = 0.0
//! max = 100.0
//! step = 1.0
//! sets = { low = [0.0, 0.0, 50.0], high = [50.0, 100.0, 100.0] }
//!
//! [[rules]]
//! rule = "IF speed IS high THEN action IS brake"
//! weight = 0.8
//!
//! [[bands]]
//! label = "brake"
//! min = 0.0
//! max = 40.0
//! closed = "left"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::fuzzy::{ActionBand, ActionBands, Closed, Engine, MembershipFunction, RuleBase, Universe, VariableRegistry};
use crate::parser::parse_rule;
use crate::simulation::OnRowError;

// ============================================================================
// Configuration Schema
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Inference settings
    pub inference: InferenceConfig,
    /// Dataset simulation settings
    pub simulation: SimulationConfig,
    /// Linguistic variables in declaration order
    pub variables: Vec<VariableConfig>,
    /// Rules in textual form
    pub rules: Vec<RuleConfig>,
    /// Action bands in classification order
    pub bands: Vec<BandConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::driving()
    }
}

/// General configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Logging level
    pub log_level: LogLevel,
    /// Output format (text, json)
    pub format: OutputFormat,
    /// Print the action bar chart after a run
    pub chart: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            format: OutputFormat::Text,
            chart: true,
        }
    }
}

/// Inference configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Sampling step of the consequent universe; the declared step when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
}

/// Dataset simulation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for derived road condition scores
    pub road_condition_seed: u64,
    /// Seed for simulated distances
    pub distance_seed: u64,
    pub distance_min: f64,
    pub distance_max: f64,
    /// Multiplier applied to logged speeds (m/s to km/h)
    pub speed_factor: f64,
    /// What to do with a record that fails to evaluate
    pub on_error: RowErrorPolicy,
    /// Label counted for failed records under the `default` policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            road_condition_seed: 42,
            distance_seed: 7,
            distance_min: 0.0,
            distance_max: 100.0,
            speed_factor: 3.6,
            on_error: RowErrorPolicy::Skip,
            default_label: None,
        }
    }
}

impl SimulationConfig {
    /// Resolve the configured error policy
    pub fn on_row_error(&self) -> EngineResult<OnRowError> {
        match (self.on_error, &self.default_label) {
            (RowErrorPolicy::Skip, _) => Ok(OnRowError::Skip),
            (RowErrorPolicy::Abort, _) => Ok(OnRowError::Abort),
            (RowErrorPolicy::Default, Some(label)) => Ok(OnRowError::Default(label.clone())),
            (RowErrorPolicy::Default, None) => Err(EngineError::config(
                "on_error = \"default\" requires simulation.default_label",
            )
            .with_hint("set default_label to one of the band labels, e.g. \"hold\"")),
        }
    }
}

/// One linguistic variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    /// Set name to 3 (triangular) or 4 (trapezoidal) break points
    #[serde(default)]
    pub sets: IndexMap<String, Vec<f64>>,
}

fn default_step() -> f64 {
    1.0
}

impl VariableConfig {
    pub fn new(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            step,
            sets: IndexMap::new(),
        }
    }

    pub fn set(mut self, name: impl Into<String>, points: &[f64]) -> Self {
        self.sets.insert(name.into(), points.to_vec());
        self
    }
}

/// One textual rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl RuleConfig {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            name: None,
            weight: default_weight(),
        }
    }
}

/// One action band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub closed: Closed,
}

impl BandConfig {
    pub fn new(label: impl Into<String>, min: f64, max: f64, closed: Closed) -> Self {
        Self {
            label: label.into(),
            min,
            max,
            closed,
        }
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "plain" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Log level options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" | "0" => Some(LogLevel::Quiet),
            "normal" | "n" | "1" => Some(LogLevel::Normal),
            "verbose" | "v" | "2" => Some(LogLevel::Verbose),
            "debug" | "d" | "3" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    /// `tracing` filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
            LogLevel::Debug => "trace",
        }
    }
}

/// Handling of records that fail to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    #[default]
    Skip,
    Abort,
    Default,
}

impl RowErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowErrorPolicy::Skip => "skip",
            RowErrorPolicy::Abort => "abort",
            RowErrorPolicy::Default => "default",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Some(RowErrorPolicy::Skip),
            "abort" | "fail" => Some(RowErrorPolicy::Abort),
            "default" | "fallback" => Some(RowErrorPolicy::Default),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl ControllerConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from default locations
    ///
    /// Searches for config files in order:
    /// 1. ./fuzzdrive.toml
    /// 2. ~/.config/fuzzdrive/config.toml
    /// 3. ~/.fuzzdrive/config.toml
    /// 4. /etc/fuzzdrive/config.toml
    ///
    /// Then applies environment variable overrides.
    pub fn load() -> EngineResult<Self> {
        let mut config = Self::default();

        match Self::locate() {
            Some(path) => config = Self::load_from_file(&path)?,
            None => debug!("no configuration file found, using the driving preset"),
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::from(e)
                .with_context("path", path.display().to_string())
                .with_hint("pass --config with an existing file, or omit it to use the built-in controller")
        })?;

        let config = Self::load_from_str(&content)
            .map_err(|e| e.with_context("path", path.display().to_string()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(content: &str) -> EngineResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// First search path that exists
    pub fn locate() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|p| p.exists())
    }

    /// Get the list of config file search paths
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Project-local
        paths.push(PathBuf::from("./fuzzdrive.toml"));

        // XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fuzzdrive").join("config.toml"));
        }

        // Legacy home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".fuzzdrive").join("config.toml"));
        }

        // System-wide (Unix only)
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/fuzzdrive/config.toml"));

        paths
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // FUZZDRIVE_LOG_LEVEL
        if let Ok(val) = env::var("FUZZDRIVE_LOG_LEVEL") {
            if let Some(level) = LogLevel::from_str(&val) {
                self.general.log_level = level;
            }
        }

        // FUZZDRIVE_FORMAT
        if let Ok(val) = env::var("FUZZDRIVE_FORMAT") {
            if let Some(format) = OutputFormat::from_str(&val) {
                self.general.format = format;
            }
        }

        // FUZZDRIVE_RESOLUTION
        if let Ok(val) = env::var("FUZZDRIVE_RESOLUTION") {
            if let Ok(step) = val.parse::<f64>() {
                self.inference.resolution = Some(step);
            }
        }

        // FUZZDRIVE_ROAD_SEED
        if let Ok(val) = env::var("FUZZDRIVE_ROAD_SEED") {
            if let Ok(seed) = val.parse::<u64>() {
                self.simulation.road_condition_seed = seed;
            }
        }

        // FUZZDRIVE_DISTANCE_SEED
        if let Ok(val) = env::var("FUZZDRIVE_DISTANCE_SEED") {
            if let Ok(seed) = val.parse::<u64>() {
                self.simulation.distance_seed = seed;
            }
        }
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::config(format!("serialization failed: {}", e)))
    }

    /// Write configuration to a file
    pub fn save_to_file(&self, path: &Path) -> EngineResult<()> {
        let content = self.to_toml()?;
        fs::write(path, content)
            .map_err(|e| EngineError::config(e.to_string()).with_context("path", path.display().to_string()))
    }

    /// Run the whole declaration phase and produce an immutable engine
    ///
    /// Fails with the first declaration error: variables and sets in file
    /// order, then rules, then bands.
    pub fn build(&self) -> EngineResult<Engine> {
        let mut registry = VariableRegistry::new();
        for var in &self.variables {
            let universe = Universe::new(var.min, var.max, var.step)
                .map_err(|e| e.with_context("variable", var.name.clone()))?;
            registry.declare_variable(var.name.clone(), universe)?;
            for (set, points) in &var.sets {
                let membership = MembershipFunction::from_points(points)
                    .map_err(|e| e.with_context("variable", var.name.clone()).with_context("set", set.clone()))?;
                registry.add_set(&var.name, set.clone(), membership)?;
            }
        }

        let mut builder = RuleBase::builder(registry);
        for (index, entry) in self.rules.iter().enumerate() {
            let mut rule = parse_rule(&entry.rule)
                .map_err(|e| EngineError::from(e).with_context("rule_index", index.to_string()))?
                .with_weight(entry.weight);
            if let Some(name) = &entry.name {
                rule = rule.with_name(name.clone());
            }
            builder
                .add_rule(rule)
                .map_err(|e| e.with_context("rule_index", index.to_string()))?;
        }
        let rule_base = builder.build()?;

        let bands = self
            .bands
            .iter()
            .map(|b| ActionBand::new(b.label.clone(), b.min, b.max, b.closed))
            .collect::<EngineResult<Vec<_>>>()?;
        let bands = ActionBands::from_bands(bands)?;

        let mut engine = Engine::new(rule_base, bands)?;
        if let Some(step) = self.inference.resolution {
            engine = engine.with_resolution(step)?;
        }

        for (from, to) in engine.band_gaps() {
            warn!(from, to, "no action band covers this output range; values there are unclassifiable");
        }

        info!(
            variables = self.variables.len(),
            rules = engine.rule_base().len(),
            bands = engine.bands().len(),
            consequent = engine.rule_base().consequent_variable(),
            "controller ready"
        );
        Ok(engine)
    }

    /// The driving controller: distance, speed, road condition and throttle
    /// deciding between brake, hold and accelerate
    pub fn driving() -> Self {
        let shapes = |v: VariableConfig, names: [&str; 3], max: f64| {
            v.set(names[0], &[0.0, 0.0, max / 2.0])
                .set(names[1], &[0.0, max / 2.0, max])
                .set(names[2], &[max / 2.0, max, max])
        };

        let variables = vec![
            shapes(VariableConfig::new("distance", 0.0, 100.0, 1.0), ["close", "medium", "far"], 100.0),
            shapes(VariableConfig::new("speed", 0.0, 100.0, 1.0), ["low", "medium", "high"], 100.0),
            shapes(VariableConfig::new("road_condition", 0.0, 10.0, 1.0), ["poor", "normal", "good"], 10.0),
            shapes(VariableConfig::new("throttle", 0.0, 1.0, 0.1), ["low", "medium", "high"], 1.0),
            shapes(VariableConfig::new("action", 0.0, 100.0, 1.0), ["brake", "hold", "accelerate"], 100.0),
        ];

        let rules = DRIVING_RULES.iter().map(|text| RuleConfig::new(*text)).collect();

        let bands = vec![
            BandConfig::new("brake", 0.0, 40.0, Closed::Left),
            BandConfig::new("hold", 40.0, 50.0, Closed::Both),
            BandConfig::new("accelerate", 50.0, 100.0, Closed::Right),
        ];

        Self {
            general: GeneralConfig::default(),
            inference: InferenceConfig::default(),
            simulation: SimulationConfig::default(),
            variables,
            rules,
            bands,
        }
    }

    /// Generate a default configuration file content
    pub fn default_config_content() -> &'static str {
        DEFAULT_CONFIG
    }
}

const DRIVING_RULES: [&str; 20] = [
    "IF distance IS close AND speed IS high THEN action IS brake",
    "IF distance IS close AND speed IS medium THEN action IS brake",
    "IF distance IS medium AND speed IS high THEN action IS brake",
    "IF distance IS medium AND speed IS medium AND road_condition IS poor THEN action IS brake",
    "IF distance IS medium AND speed IS medium AND road_condition IS normal THEN action IS hold",
    "IF distance IS far AND speed IS low THEN action IS accelerate",
    "IF distance IS far AND speed IS medium THEN action IS accelerate",
    "IF distance IS far AND speed IS high THEN action IS hold",
    "IF road_condition IS poor THEN action IS brake",
    "IF road_condition IS normal THEN action IS hold",
    "IF road_condition IS good AND throttle IS high THEN action IS accelerate",
    "IF distance IS close AND road_condition IS poor THEN action IS brake",
    "IF distance IS medium AND road_condition IS good THEN action IS hold",
    "IF distance IS far AND road_condition IS poor THEN action IS hold",
    "IF distance IS far AND road_condition IS good THEN action IS accelerate",
    "IF speed IS low AND throttle IS low THEN action IS hold",
    "IF speed IS medium AND throttle IS medium THEN action IS hold",
    "IF speed IS high AND throttle IS high THEN action IS hold",
    "IF speed IS low AND road_condition IS good THEN action IS accelerate",
    "IF speed IS high AND road_condition IS poor THEN action IS brake",
];

const DEFAULT_CONFIG: &str = r#"# fuzzdrive configuration file
# Sections left out fall back to the built-in driving controller.

[general]
# Logging level: quiet, normal, verbose, debug
log_level = "normal"
# Output format: text, json
format = "text"
# Print the action bar chart after a dataset run
chart = true

[inference]
# Sampling step of the action universe (defaults to the declared step)
# resolution = 0.5

[simulation]
# Seed for the derived road condition score (0-10)
road_condition_seed = 42
# Seed and range for simulated distances
distance_seed = 7
distance_min = 0.0
distance_max = 100.0
# Logged speed is in m/s; the controller reasons in km/h
speed_factor = 3.6
# Failed records: skip, abort, default (requires default_label)
on_error = "skip"
# default_label = "hold"

# Variables: sets map a name to 3 (triangular) or 4 (trapezoidal) break points.
# The variable named in every rule's THEN clause is the output.

[[variables]]
name = "distance"
min = 0.0
max = 100.0
step = 1.0
sets = { close = [0.0, 0.0, 50.0], medium = [0.0, 50.0, 100.0], far = [50.0, 100.0, 100.0] }

[[variables]]
name = "speed"
min = 0.0
max = 100.0
step = 1.0
sets = { low = [0.0, 0.0, 50.0], medium = [0.0, 50.0, 100.0], high = [50.0, 100.0, 100.0] }

[[variables]]
name = "road_condition"
min = 0.0
max = 10.0
step = 1.0
sets = { poor = [0.0, 0.0, 5.0], normal = [0.0, 5.0, 10.0], good = [5.0, 10.0, 10.0] }

[[variables]]
name = "throttle"
min = 0.0
max = 1.0
step = 0.1
sets = { low = [0.0, 0.0, 0.5], medium = [0.0, 0.5, 1.0], high = [0.5, 1.0, 1.0] }

[[variables]]
name = "action"
min = 0.0
max = 100.0
step = 1.0
sets = { brake = [0.0, 0.0, 50.0], hold = [0.0, 50.0, 100.0], accelerate = [50.0, 100.0, 100.0] }

# Rules: IF <variable> IS <set> [AND|OR ...] THEN <variable> IS <set>
# Optional: name = "...", weight = 0.0 - 1.0

[[rules]]
rule = "IF distance IS close AND speed IS high THEN action IS brake"

[[rules]]
rule = "IF distance IS close AND speed IS medium THEN action IS brake"

[[rules]]
rule = "IF distance IS medium AND speed IS high THEN action IS brake"

[[rules]]
rule = "IF distance IS medium AND speed IS medium AND road_condition IS poor THEN action IS brake"

[[rules]]
rule = "IF distance IS medium AND speed IS medium AND road_condition IS normal THEN action IS hold"

[[rules]]
rule = "IF distance IS far AND speed IS low THEN action IS accelerate"

[[rules]]
rule = "IF distance IS far AND speed IS medium THEN action IS accelerate"

[[rules]]
rule = "IF distance IS far AND speed IS high THEN action IS hold"

[[rules]]
rule = "IF road_condition IS poor THEN action IS brake"

[[rules]]
rule = "IF road_condition IS normal THEN action IS hold"

[[rules]]
rule = "IF road_condition IS good AND throttle IS high THEN action IS accelerate"

[[rules]]
rule = "IF distance IS close AND road_condition IS poor THEN action IS brake"

[[rules]]
rule = "IF distance IS medium AND road_condition IS good THEN action IS hold"

[[rules]]
rule = "IF distance IS far AND road_condition IS poor THEN action IS hold"

[[rules]]
rule = "IF distance IS far AND road_condition IS good THEN action IS accelerate"

[[rules]]
rule = "IF speed IS low AND throttle IS low THEN action IS hold"

[[rules]]
rule = "IF speed IS medium AND throttle IS medium THEN action IS hold"

[[rules]]
rule = "IF speed IS high AND throttle IS high THEN action IS hold"

[[rules]]
rule = "IF speed IS low AND road_condition IS good THEN action IS accelerate"

[[rules]]
rule = "IF speed IS high AND road_condition IS poor THEN action IS brake"

# Bands are checked in order; closed = both, left, right or neither

[[bands]]
label = "brake"
min = 0.0
max = 40.0
closed = "left"

[[bands]]
label = "hold"
min = 40.0
max = 50.0
closed = "both"

[[bands]]
label = "accelerate"
min = 50.0
max = 100.0
closed = "right"
"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::fuzzy::CrispInputs;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::new();
        assert_eq!(config.general.format, OutputFormat::Text);
        assert_eq!(config.simulation.road_condition_seed, 42);
        assert_eq!(config.simulation.speed_factor, 3.6);
        assert_eq!(config.variables.len(), 5);
        assert_eq!(config.rules.len(), 20);
        assert_eq!(config.bands.len(), 3);
    }

    #[test]
    fn test_default_content_matches_preset() {
        let parsed = ControllerConfig::load_from_str(ControllerConfig::default_config_content()).unwrap();
        assert_eq!(parsed, ControllerConfig::driving());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [general]
            format = "json"
            log_level = "verbose"

            [inference]
            resolution = 0.5

            [simulation]
            road_condition_seed = 9
            on_error = "default"
            default_label = "hold"
        "#;

        let config = ControllerConfig::load_from_str(toml).unwrap();
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.general.log_level, LogLevel::Verbose);
        assert_eq!(config.inference.resolution, Some(0.5));
        assert_eq!(config.simulation.road_condition_seed, 9);
        assert_eq!(config.simulation.on_row_error().unwrap(), OnRowError::Default("hold".to_string()));
        // omitted sections keep the driving controller
        assert_eq!(config.rules.len(), 20);
    }

    #[test]
    fn test_default_policy_requires_label() {
        let config = ControllerConfig::load_from_str("[simulation]\non_error = \"default\"").unwrap();
        let err = config.simulation.on_row_error().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_invalid_syntax() {
        let err = ControllerConfig::load_from_str("[general\nformat = ").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfigSyntax);

        let err = ControllerConfig::load_from_str("[general]\nformat = \"xml\"").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfigSyntax);
    }

    #[test]
    fn test_enum_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("yaml"), None);
        assert_eq!(LogLevel::from_str("quiet"), Some(LogLevel::Quiet));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Debug));
        assert_eq!(RowErrorPolicy::from_str("abort"), Some(RowErrorPolicy::Abort));
        assert_eq!(LogLevel::Verbose.filter_directive(), "debug");
    }

    #[test]
    fn test_build_driving_engine() {
        let engine = ControllerConfig::driving().build().unwrap();
        assert_eq!(engine.rule_base().consequent_variable(), "action");
        assert_eq!(engine.rule_base().len(), 20);
        let names: Vec<&str> = engine.rule_base().antecedent_variables().collect();
        assert_eq!(names, vec!["distance", "speed", "road_condition", "throttle"]);

        let inputs = CrispInputs::new()
            .with("distance", 10.0)
            .with("speed", 90.0)
            .with("road_condition", 5.0)
            .with("throttle", 0.5);
        assert!(engine.evaluate(&inputs).is_ok());
    }

    #[test]
    fn test_build_applies_resolution() {
        let mut config = ControllerConfig::driving();
        config.inference.resolution = Some(0.5);
        assert_eq!(config.build().unwrap().grid().len(), 201);

        config.inference.resolution = Some(-1.0);
        assert_eq!(config.build().unwrap_err().code, ErrorCode::InvalidUniverse);
    }

    #[test]
    fn test_build_reports_first_declaration_error() {
        let mut config = ControllerConfig::driving();
        config.variables[1].sets.insert("warp".to_string(), vec![90.0, 10.0, 50.0]);
        let err = config.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidMembership);
        assert_eq!(err.context_field("set"), Some("warp"));

        let mut config = ControllerConfig::driving();
        config.rules.push(RuleConfig::new("IF speed IS warp THEN action IS brake"));
        let err = config.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSet);
        assert_eq!(err.context_field("rule_index"), Some("20"));

        let mut config = ControllerConfig::driving();
        config.rules[0].rule = "IF distance close THEN".to_string();
        assert_eq!(config.build().unwrap_err().code, ErrorCode::RuleSyntax);

        let mut config = ControllerConfig::driving();
        config.rules[3].weight = 1.5;
        assert_eq!(config.build().unwrap_err().code, ErrorCode::InvalidRuleWeight);

        let mut config = ControllerConfig::driving();
        config.bands.push(BandConfig::new("coast", 45.0, 60.0, Closed::Both));
        assert_eq!(config.build().unwrap_err().code, ErrorCode::InvalidBand);

        let mut config = ControllerConfig::driving();
        config.rules.clear();
        assert_eq!(config.build().unwrap_err().code, ErrorCode::EmptyRuleBase);
    }

    #[test]
    fn test_build_accepts_band_gaps() {
        assert!(ControllerConfig::driving().build().unwrap().band_gaps().is_empty());

        let mut config = ControllerConfig::driving();
        config.bands.pop();
        let engine = config.build().unwrap();
        assert_eq!(engine.band_gaps(), vec![(50.0, 100.0)]);
        assert_eq!(engine.bands().classify(75.0).unwrap_err().code, ErrorCode::Unclassifiable);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut config = ControllerConfig::driving();
        config.rules[0].name = Some("close-fast".to_string());
        config.rules[0].weight = 0.5;
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[[rules]]"));
        assert_eq!(ControllerConfig::load_from_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fuzzdrive.toml");
        ControllerConfig::driving().save_to_file(&path).unwrap();
        let loaded = ControllerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, ControllerConfig::driving());

        let err = ControllerConfig::load_from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
        assert!(err.context_field("path").is_some());
    }

    #[test]
    fn test_config_paths() {
        let paths = ControllerConfig::config_paths();
        assert!(!paths.is_empty());
        assert!(paths[0].ends_with("fuzzdrive.toml"));
        if let Some(found) = ControllerConfig::locate() {
            assert!(paths.contains(&found) && found.exists());
        }
    }
}
