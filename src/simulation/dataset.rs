//! Driving log input
//!
//! A driving log is a header-led, comma-separated file. The `speed` (m/s)
//! and `throttle` (0-1) columns are required; a `road_condition` column is
//! used when present and every other column is ignored. Empty cells and
//! `nan` read as NaN so the record fails at evaluation time instead of
//! failing the whole load. Cells may be double-quoted to carry commas, with
//! `""` for a literal quote; a quoted cell cannot span lines.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// One row of the driving log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrivingRecord {
    /// Speed in m/s as logged
    pub speed: f64,
    pub throttle: f64,
    /// Road quality score in [0, 10]
    pub road_condition: Option<f64>,
}

impl DrivingRecord {
    pub fn new(speed: f64, throttle: f64) -> Self {
        Self {
            speed,
            throttle,
            road_condition: None,
        }
    }

    pub fn with_road_condition(mut self, score: f64) -> Self {
        self.road_condition = Some(score);
        self
    }
}

/// Read a driving log from disk
pub fn load_driving_log(path: &Path) -> EngineResult<Vec<DrivingRecord>> {
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::dataset("cannot read driving log")
            .with_cause(e.to_string())
            .with_context("path", path.display().to_string())
    })?;
    let records = parse_driving_log(&content).map_err(|e| e.with_context("path", path.display().to_string()))?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded driving log");
    Ok(records)
}

/// Parse driving log text
pub fn parse_driving_log(content: &str) -> EngineResult<Vec<DrivingRecord>> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| EngineError::dataset("driving log is empty"))?;
    let columns: Vec<String> = split_row(header).into_iter().map(|c| c.to_ascii_lowercase()).collect();
    let column = |name: &str| columns.iter().position(|c| c == name);

    let speed_col = column("speed").ok_or_else(|| missing_column("speed"))?;
    let throttle_col = column("throttle").ok_or_else(|| missing_column("throttle"))?;
    let road_col = column("road_condition");

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let cells = split_row(line);
        if cells.len() != columns.len() {
            return Err(EngineError::dataset(format!(
                "line {} has {} fields, header has {}",
                line_no,
                cells.len(),
                columns.len()
            ))
            .with_context("line", line_no.to_string()));
        }

        let mut record = DrivingRecord::new(
            parse_cell(&cells[speed_col], "speed", line_no)?,
            parse_cell(&cells[throttle_col], "throttle", line_no)?,
        );
        if let Some(col) = road_col {
            record.road_condition = Some(parse_cell(&cells[col], "road_condition", line_no)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn missing_column(name: &str) -> EngineError {
    EngineError::dataset(format!("driving log has no '{}' column", name))
        .with_hint("the header must name at least the speed and throttle columns")
}

fn parse_cell(cell: &str, column: &str, line_no: usize) -> EngineResult<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        EngineError::dataset(format!("line {}: '{}' is not a number in column '{}'", line_no, cell, column))
            .with_context("line", line_no.to_string())
            .with_context("column", column)
    })
}

/// Give every record without a road condition an integer score in [0, 10]
///
/// One score is drawn per record in order, so a record's score depends only
/// on the seed and its position. Records that already carry a score keep it.
pub fn assign_road_conditions(records: &[DrivingRecord], seed: u64) -> Vec<DrivingRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    records
        .iter()
        .map(|record| {
            let drawn = f64::from(rng.gen_range(0..=10u32));
            DrivingRecord {
                road_condition: Some(record.road_condition.unwrap_or(drawn)),
                ..*record
            }
        })
        .collect()
}
