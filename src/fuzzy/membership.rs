//! Membership functions and truth degrees
//!
//! Piecewise-linear shapes over a variable's universe:
//! - Triangular `(a, b, c)` with `a <= b <= c`
//! - Trapezoidal `(a, b, c, d)` with `a <= b <= c <= d`
//!
//! Degenerate shapes (`a == b` or `b == c`) give left/right shoulders. The
//! peak always evaluates to 1, so a shoulder at the edge of the universe is
//! fully true there.

use std::fmt;

use serde::Serialize;

use crate::error::{EngineResult, ErrorCode};

/// A truth degree in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct Degree(f64);

impl Degree {
    pub const ZERO: Degree = Degree(0.0);
    pub const ONE: Degree = Degree(1.0);

    /// Clamp into [0, 1]; NaN becomes 0
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Fuzzy AND (minimum t-norm)
    pub fn and(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Fuzzy OR (maximum t-conorm)
    pub fn or(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Scale by a rule weight in [0, 1]
    pub fn scaled(self, weight: f64) -> Self {
        Self::new(self.0 * weight)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl From<f64> for Degree {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Membership function shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum MembershipFunction {
    /// Triangular: (left, peak, right)
    Triangular { a: f64, b: f64, c: f64 },
    /// Trapezoidal: (left, left_top, right_top, right)
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
}

impl MembershipFunction {
    /// Triangular shape; break points must be finite and ordered
    pub fn triangular(a: f64, b: f64, c: f64) -> EngineResult<Self> {
        check_breakpoints(&[a, b, c])?;
        Ok(MembershipFunction::Triangular { a, b, c })
    }

    /// Trapezoidal shape; break points must be finite and ordered
    pub fn trapezoidal(a: f64, b: f64, c: f64, d: f64) -> EngineResult<Self> {
        check_breakpoints(&[a, b, c, d])?;
        Ok(MembershipFunction::Trapezoidal { a, b, c, d })
    }

    /// Build from a break point list: 3 points for a triangle, 4 for a trapezoid
    pub fn from_points(points: &[f64]) -> EngineResult<Self> {
        match *points {
            [a, b, c] => Self::triangular(a, b, c),
            [a, b, c, d] => Self::trapezoidal(a, b, c, d),
            _ => crate::engine_bail!(
                ErrorCode::InvalidMembership,
                "expected 3 (triangular) or 4 (trapezoidal) break points, got {}",
                points.len()
            ),
        }
    }

    /// Evaluate membership for a crisp value
    pub fn evaluate(&self, x: f64) -> Degree {
        if x.is_nan() {
            return Degree::ZERO;
        }
        let result = match *self {
            MembershipFunction::Triangular { a, b, c } => {
                if x == b {
                    1.0
                } else if x <= a || x >= c {
                    0.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (c - x) / (c - b)
                }
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                if x >= b && x <= c {
                    1.0
                } else if x <= a || x >= d {
                    0.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
        };

        Degree::new(result)
    }

    /// Interval where membership is 1
    pub fn core(&self) -> (f64, f64) {
        match *self {
            MembershipFunction::Triangular { b, .. } => (b, b),
            MembershipFunction::Trapezoidal { b, c, .. } => (b, c),
        }
    }

    /// Interval outside of which membership is 0
    pub fn support(&self) -> (f64, f64) {
        match *self {
            MembershipFunction::Triangular { a, c, .. } => (a, c),
            MembershipFunction::Trapezoidal { a, d, .. } => (a, d),
        }
    }

    /// Break points in declaration order
    pub fn points(&self) -> Vec<f64> {
        match *self {
            MembershipFunction::Triangular { a, b, c } => vec![a, b, c],
            MembershipFunction::Trapezoidal { a, b, c, d } => vec![a, b, c, d],
        }
    }
}

fn check_breakpoints(points: &[f64]) -> EngineResult<()> {
    crate::engine_ensure!(
        points.iter().all(|p| p.is_finite()),
        ErrorCode::InvalidMembership,
        "break points must be finite: {:?}",
        points
    );
    crate::engine_ensure!(
        points.windows(2).all(|w| w[0] <= w[1]),
        ErrorCode::InvalidMembership,
        "break points must be in ascending order: {:?}",
        points
    );
    Ok(())
}
