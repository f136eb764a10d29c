//! Universe of discourse
//!
//! A universe is the closed range `[min, max]` sampled at a fixed step. It
//! declares the domain of a linguistic variable and doubles as the grid on
//! which consequent sets are aggregated and defuzzified.

use serde::Serialize;

use crate::error::{EngineResult, ErrorCode};

/// Tolerance used when deciding whether the last sample still fits in range
const SAMPLE_EPSILON: f64 = 1e-9;

/// Upper bound on the number of sample points in one universe
pub const MAX_SAMPLES: usize = 10_000_000;

/// A finite, ordered sampling of a continuous range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Universe {
    min: f64,
    max: f64,
    step: f64,
}

impl Universe {
    /// Create a universe, rejecting empty ranges and non-positive steps
    pub fn new(min: f64, max: f64, step: f64) -> EngineResult<Self> {
        crate::engine_ensure!(
            min.is_finite() && max.is_finite() && step.is_finite(),
            ErrorCode::InvalidUniverse,
            "universe bounds must be finite (min={}, max={}, step={})",
            min,
            max,
            step
        );
        crate::engine_ensure!(
            min < max,
            ErrorCode::InvalidUniverse,
            "universe min {} must be below max {}",
            min,
            max
        );
        crate::engine_ensure!(
            step > 0.0,
            ErrorCode::InvalidUniverse,
            "universe step {} must be positive",
            step
        );
        let intervals = (max - min) / step;
        crate::engine_ensure!(
            intervals < MAX_SAMPLES as f64,
            ErrorCode::InvalidUniverse,
            "universe step {} over [{}, {}] exceeds {} sample points",
            step,
            min,
            max,
            MAX_SAMPLES
        );
        Ok(Self { min, max, step })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of sample points, at most [`MAX_SAMPLES`]
    pub fn len(&self) -> usize {
        let intervals = ((self.max - self.min) / self.step + SAMPLE_EPSILON).floor() as usize;
        intervals.saturating_add(1).min(MAX_SAMPLES)
    }

    /// A universe always holds at least its minimum
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Sample point at `index`, computed from `min` to avoid accumulated drift
    pub fn point(&self, index: usize) -> f64 {
        self.min + index as f64 * self.step
    }

    /// Iterate over all sample points in ascending order
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }

    /// Whether `x` lies within `[min, max]`
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }

    /// Clamp `x` into `[min, max]`
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    /// Same range sampled at a different step
    pub fn resampled(&self, step: f64) -> EngineResult<Self> {
        Self::new(self.min, self.max, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_universe() {
        let u = Universe::new(0.0, 100.0, 1.0).unwrap();
        assert_eq!(u.len(), 101);
        assert_eq!(u.points().next(), Some(0.0));
        assert_eq!(u.points().last(), Some(100.0));
    }

    #[test]
    fn test_fractional_step_keeps_last_point() {
        let u = Universe::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(u.len(), 11);
        assert!((u.point(10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_not_dividing_range() {
        let u = Universe::new(0.0, 10.0, 3.0).unwrap();
        let points: Vec<f64> = u.points().collect();
        assert_eq!(points, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_invalid_universes() {
        assert_eq!(Universe::new(0.0, 10.0, 0.0).unwrap_err().code, ErrorCode::InvalidUniverse);
        assert_eq!(Universe::new(0.0, 10.0, -1.0).unwrap_err().code, ErrorCode::InvalidUniverse);
        assert_eq!(Universe::new(5.0, 5.0, 1.0).unwrap_err().code, ErrorCode::InvalidUniverse);
        assert_eq!(Universe::new(0.0, f64::NAN, 1.0).unwrap_err().code, ErrorCode::InvalidUniverse);
    }

    #[test]
    fn test_tiny_step_is_rejected() {
        for step in [1e-300, 1e-9, 1e-5] {
            let err = Universe::new(0.0, 100.0, step).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidUniverse);
        }
        // just under the cap is still accepted
        let u = Universe::new(0.0, 1.0, 1.0 / (MAX_SAMPLES as f64 - 10.0)).unwrap();
        assert!(u.len() <= MAX_SAMPLES);
        assert!(Universe::new(0.0, 100.0, 1.0).unwrap().resampled(1e-12).is_err());
    }

    #[test]
    fn test_clamp_and_resample() {
        let u = Universe::new(0.0, 100.0, 1.0).unwrap();
        assert_eq!(u.clamp(130.0), 100.0);
        assert_eq!(u.clamp(-3.0), 0.0);
        assert!(u.contains(42.5));
        let fine = u.resampled(0.5).unwrap();
        assert_eq!(fine.len(), 201);
        assert_eq!(fine.min(), u.min());
    }
}
