//! Evaluation engine
//!
//! Composes the registry, rule base and action bands into one immutable
//! value. `Engine` is `Send + Sync`; every evaluation allocates its own
//! aggregation buffer, so any number of threads may evaluate concurrently.

use serde::Serialize;

use crate::error::EngineResult;

use super::decision::ActionBands;
use super::inference::{infer_detailed, CrispInputs, Inference};
use super::rule::RuleBase;
use super::universe::Universe;

/// Crisp output and the label of the band that contains it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub output: f64,
    pub label: String,
}

/// Immutable fuzzy controller: rule base, output grid and action bands
#[derive(Debug, Clone)]
pub struct Engine {
    rule_base: RuleBase,
    bands: ActionBands,
    grid: Universe,
}

impl Engine {
    /// Aggregate on the consequent's declared universe
    pub fn new(rule_base: RuleBase, bands: ActionBands) -> EngineResult<Self> {
        let grid = *rule_base
            .registry()
            .variable(rule_base.consequent_variable())?
            .universe();
        Ok(Self { rule_base, bands, grid })
    }

    /// Aggregate on the consequent's range resampled at `resolution`
    pub fn with_resolution(mut self, resolution: f64) -> EngineResult<Self> {
        self.grid = self.grid.resampled(resolution)?;
        Ok(self)
    }

    pub fn rule_base(&self) -> &RuleBase {
        &self.rule_base
    }

    pub fn bands(&self) -> &ActionBands {
        &self.bands
    }

    /// Sampling grid used for aggregation and defuzzification
    pub fn grid(&self) -> &Universe {
        &self.grid
    }

    /// Parts of the output range no band covers; outputs there are unclassifiable
    pub fn band_gaps(&self) -> Vec<(f64, f64)> {
        self.bands.gaps(self.grid.min(), self.grid.max())
    }

    /// Crisp output only
    pub fn infer(&self, inputs: &CrispInputs) -> EngineResult<f64> {
        self.inspect(inputs).map(|inference| inference.output)
    }

    /// Firing strengths, aggregated set and crisp output
    pub fn inspect(&self, inputs: &CrispInputs) -> EngineResult<Inference> {
        infer_detailed(&self.rule_base, inputs, &self.grid)
    }

    /// Infer and classify one input tuple
    pub fn evaluate(&self, inputs: &CrispInputs) -> EngineResult<Evaluation> {
        let output = self.infer(inputs)?;
        let label = self.bands.classify(output)?.to_string();
        Ok(Evaluation { output, label })
    }

    /// Evaluate many tuples in parallel; results keep input order
    pub fn evaluate_batch(&self, inputs: &[CrispInputs]) -> Vec<EngineResult<Evaluation>> {
        use rayon::prelude::*;

        inputs.par_iter().map(|tuple| self.evaluate(tuple)).collect()
    }
}

/// One-shot composition of rule base and bands
pub fn evaluate(rule_base: &RuleBase, bands: &ActionBands, inputs: &CrispInputs) -> EngineResult<Evaluation> {
    let output = super::inference::infer(rule_base, inputs)?;
    let label = bands.classify(output)?.to_string();
    Ok(Evaluation { output, label })
}
