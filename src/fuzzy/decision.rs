//! Decision mapping
//!
//! Partitions the crisp output range into labeled bands. Each band states
//! which of its ends are inclusive, so a value on a shared boundary always
//! resolves to the band that includes it. Bands are checked in declaration
//! order and the first containing band wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, ErrorCode};

/// Which ends of a band are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Closed {
    /// `[min, max]`
    #[default]
    Both,
    /// `[min, max)`
    Left,
    /// `(min, max]`
    Right,
    /// `(min, max)`
    Neither,
}

impl Closed {
    fn includes_min(self) -> bool {
        matches!(self, Closed::Both | Closed::Left)
    }

    fn includes_max(self) -> bool {
        matches!(self, Closed::Both | Closed::Right)
    }
}

/// A labeled interval on the crisp output range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionBand {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub closed: Closed,
}

impl ActionBand {
    pub fn new(label: impl Into<String>, min: f64, max: f64, closed: Closed) -> EngineResult<Self> {
        let label = label.into();
        crate::engine_ensure!(
            min.is_finite() && max.is_finite() && min <= max,
            ErrorCode::InvalidBand,
            "band '{}' has an invalid range [{}, {}]",
            label,
            min,
            max
        );
        crate::engine_ensure!(
            min < max || closed == Closed::Both,
            ErrorCode::InvalidBand,
            "band '{}' is empty",
            label
        );
        Ok(Self { label, min, max, closed })
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = if self.closed.includes_min() { value >= self.min } else { value > self.min };
        let below = if self.closed.includes_max() { value <= self.max } else { value < self.max };
        above && below
    }

    /// Whether the two bands share at least one point
    pub fn overlaps(&self, other: &ActionBand) -> bool {
        if self.max < other.min || other.max < self.min {
            return false;
        }
        if self.max == other.min {
            return self.closed.includes_max() && other.closed.includes_min();
        }
        if other.max == self.min {
            return other.closed.includes_max() && self.closed.includes_min();
        }
        true
    }
}

impl fmt::Display for ActionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.closed.includes_min() { '[' } else { '(' };
        let close = if self.closed.includes_max() { ']' } else { ')' };
        write!(f, "{} {}{}, {}{}", self.label, open, self.min, self.max, close)
    }
}

/// Ordered, non-overlapping action bands
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionBands {
    bands: Vec<ActionBand>,
}

impl ActionBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a band; fails if it overlaps an existing band or reuses a label
    pub fn push(&mut self, band: ActionBand) -> EngineResult<()> {
        for existing in &self.bands {
            if existing.label == band.label {
                return Err(EngineError::new(
                    ErrorCode::InvalidBand,
                    format!("band label '{}' is declared twice", band.label),
                ));
            }
            if existing.overlaps(&band) {
                return Err(EngineError::new(
                    ErrorCode::InvalidBand,
                    format!("band {} overlaps band {}", band, existing),
                ));
            }
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn from_bands(bands: impl IntoIterator<Item = ActionBand>) -> EngineResult<Self> {
        let mut out = Self::new();
        for band in bands {
            out.push(band)?;
        }
        Ok(out)
    }

    /// Label of the first band containing `value`
    pub fn classify(&self, value: f64) -> EngineResult<&str> {
        self.bands
            .iter()
            .find(|band| band.contains(value))
            .map(|band| band.label.as_str())
            .ok_or_else(|| EngineError::unclassifiable(value))
    }

    /// Sub-ranges of `[min, max]` not covered by any band
    pub fn gaps(&self, min: f64, max: f64) -> Vec<(f64, f64)> {
        let mut sorted: Vec<&ActionBand> = self.bands.iter().collect();
        sorted.sort_by(|a, b| a.min.total_cmp(&b.min));
        let mut gaps = Vec::new();
        let mut cursor = min;
        for band in sorted {
            if band.min > cursor {
                gaps.push((cursor, band.min.min(max)));
            }
            cursor = cursor.max(band.max);
        }
        if cursor < max {
            gaps.push((cursor, max));
        }
        gaps
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(|b| b.label.as_str())
    }

    pub fn bands(&self) -> &[ActionBand] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Classify `crisp_output` against `bands`
pub fn classify(crisp_output: f64, bands: &ActionBands) -> EngineResult<&str> {
    bands.classify(crisp_output)
}
