//! fuzzdrive - Fuzzy Driving Controller
//!
//! Command-line interface: replay a driving log through the controller or
//! evaluate a single input tuple.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fuzzdrive::config::{ControllerConfig, LogLevel, OutputFormat, RowErrorPolicy};
use fuzzdrive::simulation::{assign_road_conditions, load_driving_log, DistancePolicy};
use fuzzdrive::{
    render_bar_chart, CrispInputs, Engine, EngineError, FixedDistance, SeededUniformDistance, Simulation,
};

const CHART_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "fuzzdrive")]
#[command(version = "0.1.0")]
#[command(about = "Fuzzy driving controller - maps driving measurements to brake, hold or accelerate", long_about = None)]
struct Cli {
    /// Driving log (CSV with speed and throttle columns)
    #[arg(value_name = "DATASET", default_value = "dataset/driving_log.csv")]
    dataset: PathBuf,

    /// Configuration file (defaults to the standard search path)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed for derived road condition scores
    #[arg(long, value_name = "N")]
    road_seed: Option<u64>,

    /// Seed for simulated distances
    #[arg(long, value_name = "N")]
    distance_seed: Option<u64>,

    /// Use a fixed distance for every record instead of a seeded draw
    #[arg(long, value_name = "X")]
    distance: Option<f64>,

    /// Sampling step of the output universe
    #[arg(long, value_name = "STEP")]
    resolution: Option<f64>,

    /// What to do with a record that fails to evaluate
    #[arg(long, value_enum)]
    on_error: Option<OnErrorArg>,

    /// Label counted for failed records with --on-error default
    #[arg(long, value_name = "LABEL")]
    default_label: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Do not print the action chart
    #[arg(long)]
    no_chart: bool,

    /// Evaluate one tuple, e.g. "distance=10,speed=90,road_condition=5,throttle=0.5"
    #[arg(long, value_name = "INPUTS")]
    eval: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// One line per record and a bar chart
    Text,
    /// A single JSON document
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OnErrorArg {
    /// Report the record and continue
    Skip,
    /// Stop at the first failing record
    Abort,
    /// Count the record under --default-label
    Default,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = load_config(&cli)?;
    init_logging(config.general.log_level);
    match &source {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => info!("no configuration file found, using the driving preset"),
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    match run(&cli, &config) {
        Err(err) if config.general.format == OutputFormat::Json => match err.downcast_ref::<EngineError>() {
            Some(engine_err) => {
                println!("{}", engine_err.to_json());
                process::exit(1);
            }
            None => Err(err),
        },
        result => result,
    }
}

/// Configuration file (explicit or first on the search path), env, then flags
fn load_config(cli: &Cli) -> Result<(ControllerConfig, Option<PathBuf>)> {
    let source = cli.config.clone().or_else(ControllerConfig::locate);
    let mut config = match &source {
        Some(path) => ControllerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);
    Ok((config, source))
}

fn run(cli: &Cli, config: &ControllerConfig) -> Result<()> {
    let engine = config.build().context("Invalid controller definition")?;

    match &cli.eval {
        Some(text) => evaluate_one(&engine, text, config.general.format),
        None => run_dataset(&engine, config, cli),
    }
}

fn apply_cli_overrides(config: &mut ControllerConfig, cli: &Cli) {
    if let Some(seed) = cli.road_seed {
        config.simulation.road_condition_seed = seed;
    }
    if let Some(seed) = cli.distance_seed {
        config.simulation.distance_seed = seed;
    }
    if let Some(step) = cli.resolution {
        config.inference.resolution = Some(step);
    }
    if let Some(policy) = cli.on_error {
        config.simulation.on_error = match policy {
            OnErrorArg::Skip => RowErrorPolicy::Skip,
            OnErrorArg::Abort => RowErrorPolicy::Abort,
            OnErrorArg::Default => RowErrorPolicy::Default,
        };
    }
    if let Some(label) = &cli.default_label {
        config.simulation.default_label = Some(label.clone());
    }
    if let Some(format) = cli.format {
        config.general.format = match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if cli.no_chart {
        config.general.chart = false;
    }
    if cli.verbose {
        config.general.log_level = LogLevel::Verbose;
    }
    if cli.quiet {
        config.general.log_level = LogLevel::Quiet;
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn evaluate_one(engine: &Engine, text: &str, format: OutputFormat) -> Result<()> {
    let inputs: CrispInputs = text.parse().context("Invalid --eval inputs")?;
    let inference = engine.inspect(&inputs)?;
    let label = engine.bands().classify(inference.output)?;
    let rules = engine.rule_base().rules();
    let registry = engine.rule_base().registry();
    let dominant: Vec<(&str, f64, &str)> = inputs
        .iter()
        .filter_map(|(name, value)| {
            let (set, _) = registry.variable(name).ok()?.dominant_set(value)?;
            Some((name, value, set))
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let fired: Vec<_> = inference
                .fired()
                .map(|a| {
                    json!({
                        "rule": rules[a.rule].label(),
                        "strength": a.strength,
                        "weighted": a.weighted,
                    })
                })
                .collect();
            let sets: serde_json::Map<String, serde_json::Value> = dominant
                .iter()
                .map(|(name, _, set)| (name.to_string(), json!(set)))
                .collect();
            let doc = json!({
                "inputs": inputs,
                "sets": sets,
                "fired": fired,
                "output": inference.output,
                "label": label,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            for (name, value, set) in &dominant {
                println!("{} = {} ({})", name, value, set);
            }
            for activation in inference.fired() {
                println!("{}  {}", activation.weighted, rules[activation.rule].label());
            }
            println!("Action = {} ({:.2})", label, inference.output);
        }
    }
    Ok(())
}

fn run_dataset(engine: &Engine, config: &ControllerConfig, cli: &Cli) -> Result<()> {
    let sim = &config.simulation;
    let records = load_driving_log(&cli.dataset)
        .with_context(|| format!("Failed to read driving log: {}", cli.dataset.display()))?;
    let records = assign_road_conditions(&records, sim.road_condition_seed);

    let policy: Box<dyn DistancePolicy> = match cli.distance {
        Some(d) => Box::new(FixedDistance(d)),
        None => Box::new(SeededUniformDistance::new(sim.distance_seed, sim.distance_min, sim.distance_max)?),
    };

    let report = Simulation::new()
        .with_speed_factor(sim.speed_factor)
        .with_on_error(sim.on_row_error()?)
        .run(engine, &records, policy.as_ref())?;

    match config.general.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for row in &report.rows {
                println!("{}", row.summary());
            }
            if config.general.chart {
                println!();
                print!("{}", render_bar_chart(&report.counts, CHART_WIDTH));
            }
            if report.failures > 0 {
                eprintln!("{} of {} records failed to evaluate", report.failures, report.rows.len());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_layers_flags_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut custom = ControllerConfig::driving();
        custom.simulation.distance_min = 20.0;
        custom.save_to_file(&path).unwrap();

        let cli = Cli::try_parse_from([
            "fuzzdrive",
            "--config",
            path.to_str().unwrap(),
            "--road-seed",
            "3",
            "--format",
            "json",
            "-q",
        ])
        .unwrap();
        let (config, source) = load_config(&cli).unwrap();
        assert_eq!(source.as_deref(), Some(path.as_path()));
        assert_eq!(config.simulation.distance_min, 20.0);
        assert_eq!(config.simulation.road_condition_seed, 3);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.general.log_level, LogLevel::Quiet);
    }

    #[test]
    fn test_load_config_missing_file() {
        let cli = Cli::try_parse_from(["fuzzdrive", "--config", "/nonexistent/fuzzdrive.toml"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(engine_err.to_json().contains("CONFIG_NOT_FOUND"));
    }
}
