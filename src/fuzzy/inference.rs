//! Mamdani inference: firing, aggregation and centroid defuzzification
//!
//! For one crisp input tuple:
//! 1. every rule's firing strength `s` is computed from its antecedent tree
//! 2. each rule's consequent set is clipped at `s` over the consequent grid
//! 3. the clipped sets are combined by pointwise maximum
//! 4. the centroid `Σ u·agg(u) / Σ agg(u)` of the aggregate is the crisp output
//!
//! Max-aggregation is commutative and associative, so rule order never
//! changes the result. Rules firing at 0 are skipped during aggregation, which
//! is the same as including their all-zero contribution.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{EngineError, EngineResult, ErrorCode};

use super::membership::{Degree, MembershipFunction};
use super::registry::LinguisticVariable;
use super::rule::RuleBase;
use super::universe::Universe;

// ============================================================================
// Crisp Inputs
// ============================================================================

/// One crisp value per antecedent variable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CrispInputs {
    values: IndexMap<String, f64>,
}

impl CrispInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, variable: impl Into<String>, value: f64) -> Self {
        self.values.insert(variable.into(), value);
        self
    }

    pub fn insert(&mut self, variable: impl Into<String>, value: f64) {
        self.values.insert(variable.into(), value);
    }

    pub fn get(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parses `name=value` pairs separated by commas, e.g. `distance=10,speed=90`
impl std::str::FromStr for CrispInputs {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut inputs = CrispInputs::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                EngineError::new(ErrorCode::InvalidInput, format!("expected name=value, got '{}'", pair))
            })?;
            let value = value.trim().parse::<f64>().map_err(|_| {
                EngineError::new(ErrorCode::InvalidInput, format!("'{}' is not a number", value.trim()))
                    .with_context("variable", name.trim())
            })?;
            inputs.insert(name.trim(), value);
        }
        Ok(inputs)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for CrispInputs {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ============================================================================
// Inference Results
// ============================================================================

/// Firing of one rule for one input tuple
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleActivation {
    /// Index into the rule base
    pub rule: usize,
    /// Antecedent degree before weighting
    pub strength: Degree,
    /// Strength after the rule weight; this is the clipping level
    pub weighted: Degree,
}

/// Pointwise-maximum fuzzy set over the consequent grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedSet {
    points: Vec<(f64, f64)>,
}

impl AggregatedSet {
    /// All-zero set over `grid`
    pub fn empty(grid: &Universe) -> Self {
        Self {
            points: grid.points().map(|u| (u, 0.0)).collect(),
        }
    }

    /// `(u, agg(u))` pairs in ascending `u`
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Σ agg(u)
    pub fn mass(&self) -> f64 {
        self.points.iter().map(|(_, m)| m).sum()
    }

    pub fn height(&self) -> f64 {
        self.points.iter().map(|(_, m)| *m).fold(0.0, f64::max)
    }

    /// Centroid of the set; `NoRuleFired` when the set is empty
    pub fn centroid(&self) -> EngineResult<f64> {
        let denominator = self.mass();
        if denominator > 0.0 {
            let numerator: f64 = self.points.iter().map(|(u, m)| u * m).sum();
            Ok(numerator / denominator)
        } else {
            Err(EngineError::no_rule_fired())
        }
    }

    /// Raise every point to at least `min(level, mf(u))`
    fn absorb(&mut self, level: Degree, mf: &MembershipFunction) {
        for (u, current) in self.points.iter_mut() {
            let clipped = level.and(mf.evaluate(*u)).value();
            if clipped > *current {
                *current = clipped;
            }
        }
    }
}

/// Observable outcome of one inference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub activations: Vec<RuleActivation>,
    pub aggregate: AggregatedSet,
    pub output: f64,
}

impl Inference {
    /// Activations with a non-zero clipping level
    pub fn fired(&self) -> impl Iterator<Item = &RuleActivation> {
        self.activations.iter().filter(|a| !a.weighted.is_zero())
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Crisp output for `inputs`, aggregated on the consequent's declared universe
pub fn infer(rule_base: &RuleBase, inputs: &CrispInputs) -> EngineResult<f64> {
    let grid = *rule_base
        .registry()
        .variable(rule_base.consequent_variable())?
        .universe();
    infer_detailed(rule_base, inputs, &grid).map(|inference| inference.output)
}

/// Full inference on an explicit consequent grid
pub fn infer_detailed(rule_base: &RuleBase, inputs: &CrispInputs, grid: &Universe) -> EngineResult<Inference> {
    check_inputs(rule_base, inputs)?;

    let registry = rule_base.registry();
    let consequent = registry.variable(rule_base.consequent_variable())?;

    let mut activations = Vec::with_capacity(rule_base.len());
    for (index, rule) in rule_base.rules().iter().enumerate() {
        let strength = rule_base.firing_strength(rule, inputs)?;
        let weighted = strength.scaled(rule.weight);
        if !weighted.is_zero() {
            tracing::trace!(rule = index, strength = %strength, weighted = %weighted, "rule fired");
        }
        activations.push(RuleActivation {
            rule: index,
            strength,
            weighted,
        });
    }

    let aggregate = aggregate(rule_base, &activations, consequent, grid)?;
    let output = aggregate.centroid()?;
    tracing::debug!(
        output,
        fired = activations.iter().filter(|a| !a.weighted.is_zero()).count(),
        "defuzzified"
    );

    Ok(Inference {
        activations,
        aggregate,
        output,
    })
}

/// Clip each fired rule's consequent set and combine by pointwise maximum
pub fn aggregate(
    rule_base: &RuleBase,
    activations: &[RuleActivation],
    consequent: &LinguisticVariable,
    grid: &Universe,
) -> EngineResult<AggregatedSet> {
    let mut set = AggregatedSet::empty(grid);
    for activation in activations.iter().filter(|a| !a.weighted.is_zero()) {
        let rule = rule_base.rules().get(activation.rule).ok_or_else(|| {
            EngineError::internal(format!("activation refers to missing rule {}", activation.rule))
        })?;
        let mf = consequent
            .set(&rule.consequent.set)
            .ok_or_else(|| EngineError::unknown_set(consequent.name(), &rule.consequent.set))?;
        set.absorb(activation.weighted, mf);
    }
    Ok(set)
}

/// Every antecedent variable must have a finite value
fn check_inputs(rule_base: &RuleBase, inputs: &CrispInputs) -> EngineResult<()> {
    for variable in rule_base.antecedent_variables() {
        match inputs.get(variable) {
            None => return Err(EngineError::missing_input(variable)),
            Some(v) if !v.is_finite() => {
                return Err(EngineError::new(
                    ErrorCode::InvalidInput,
                    format!("input for '{}' is not a finite number: {}", variable, v),
                )
                .with_context("variable", variable))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::registry::VariableRegistry;
    use crate::fuzzy::rule::{Antecedent, Consequent, Rule};
    use proptest::prelude::*;

    /// Two inputs, one output with a symmetric "hold" triangle centered at 50
    fn rule_base(rules: Vec<Rule>) -> RuleBase {
        let mut reg = VariableRegistry::new();
        let u = Universe::new(0.0, 100.0, 1.0).unwrap();
        reg.declare_variable("distance", u).unwrap();
        reg.declare_variable("speed", u).unwrap();
        reg.declare_variable("action", u).unwrap();
        for var in ["distance", "speed"] {
            reg.add_set(var, "low", MembershipFunction::triangular(0.0, 0.0, 50.0).unwrap()).unwrap();
            reg.add_set(var, "mid", MembershipFunction::triangular(0.0, 50.0, 100.0).unwrap()).unwrap();
            reg.add_set(var, "high", MembershipFunction::triangular(50.0, 100.0, 100.0).unwrap()).unwrap();
        }
        reg.add_set("action", "brake", MembershipFunction::triangular(0.0, 0.0, 50.0).unwrap()).unwrap();
        reg.add_set("action", "hold", MembershipFunction::triangular(30.0, 50.0, 70.0).unwrap()).unwrap();
        reg.add_set("action", "accelerate", MembershipFunction::triangular(50.0, 100.0, 100.0).unwrap()).unwrap();

        let mut builder = RuleBase::builder(reg);
        builder.add_rules(rules).unwrap();
        builder.build().unwrap()
    }

    fn standard_rules() -> Vec<Rule> {
        vec![
            Rule::new(
                Antecedent::is("distance", "low").and(Antecedent::is("speed", "high")),
                Consequent::new("action", "brake"),
            ),
            Rule::new(Antecedent::is("distance", "mid"), Consequent::new("action", "hold")),
            Rule::new(
                Antecedent::is("distance", "high").or(Antecedent::is("speed", "low")),
                Consequent::new("action", "accelerate"),
            ),
            Rule::new(Antecedent::is("speed", "mid"), Consequent::new("action", "hold")),
        ]
    }

    #[test]
    fn test_crisp_inputs_from_str() {
        let inputs: CrispInputs = "distance=10, speed = 90 ,throttle=0.5".parse().unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get("speed"), Some(90.0));
        assert_eq!(inputs.iter().next(), Some(("distance", 10.0)));

        assert_eq!("speed".parse::<CrispInputs>().unwrap_err().code, ErrorCode::InvalidInput);
        let err = "speed=fast".parse::<CrispInputs>().unwrap_err();
        assert_eq!(err.context_field("variable"), Some("speed"));
    }

    #[test]
    fn test_single_symmetric_rule_gives_center() {
        let rb = rule_base(vec![Rule::new(
            Antecedent::is("distance", "mid"),
            Consequent::new("action", "hold"),
        )]);
        let inputs = CrispInputs::new().with("distance", 50.0).with("speed", 0.0);
        let output = infer(&rb, &inputs).unwrap();
        assert!((output - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_rule_fired() {
        let rb = rule_base(vec![Rule::new(
            Antecedent::is("distance", "mid"),
            Consequent::new("action", "hold"),
        )]);
        let inputs = CrispInputs::new().with("distance", 0.0).with("speed", 0.0);
        let err = infer(&rb, &inputs).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoRuleFired);
    }

    #[test]
    fn test_missing_and_invalid_inputs() {
        let rb = rule_base(standard_rules());
        let err = infer(&rb, &CrispInputs::new().with("distance", 10.0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingInput);
        assert_eq!(err.context_field("variable"), Some("speed"));

        let inputs = CrispInputs::new().with("distance", f64::NAN).with("speed", 1.0);
        assert_eq!(infer(&rb, &inputs).unwrap_err().code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_aggregate_is_clipped_max() {
        let rb = rule_base(standard_rules());
        let inputs = CrispInputs::new().with("distance", 10.0).with("speed", 90.0);
        let grid = Universe::new(0.0, 100.0, 1.0).unwrap();
        let inference = infer_detailed(&rb, &inputs, &grid).unwrap();

        // brake: min(low(10)=0.8, high(90)=0.8) = 0.8
        assert!((inference.activations[0].weighted.value() - 0.8).abs() < 1e-12);
        // aggregate never exceeds the highest clipping level
        let top = inference.fired().map(|a| a.weighted.value()).fold(0.0, f64::max);
        assert!(inference.aggregate.height() <= top + 1e-12);
        // at u = 0 only brake contributes, clipped at 0.8
        assert!((inference.aggregate.points()[0].1 - 0.8).abs() < 1e-12);
        assert!(inference.output < 40.0);
    }

    #[test]
    fn test_shared_consequent_is_not_double_counted() {
        let single = rule_base(vec![Rule::new(
            Antecedent::is("distance", "mid"),
            Consequent::new("action", "hold"),
        )]);
        let doubled = rule_base(vec![
            Rule::new(Antecedent::is("distance", "mid"), Consequent::new("action", "hold")),
            Rule::new(Antecedent::is("distance", "mid"), Consequent::new("action", "hold")),
        ]);
        let inputs = CrispInputs::new().with("distance", 40.0).with("speed", 0.0);
        let grid = Universe::new(0.0, 100.0, 1.0).unwrap();
        let a = infer_detailed(&single, &inputs, &grid).unwrap();
        let b = infer_detailed(&doubled, &inputs, &grid).unwrap();
        assert_eq!(a.aggregate, b.aggregate);
        assert_eq!(a.output, b.output);
    }

    #[test]
    fn test_rule_weight_scales_clipping_level() {
        let rb = rule_base(vec![Rule::new(
            Antecedent::is("distance", "mid"),
            Consequent::new("action", "hold"),
        )
        .with_weight(0.5)]);
        let inputs = CrispInputs::new().with("distance", 50.0).with("speed", 0.0);
        let grid = Universe::new(0.0, 100.0, 1.0).unwrap();
        let inference = infer_detailed(&rb, &inputs, &grid).unwrap();
        assert_eq!(inference.activations[0].strength, Degree::ONE);
        assert!((inference.aggregate.height() - 0.5).abs() < 1e-12);
        // symmetric clip keeps the center
        assert!((inference.output - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_changes_grid_not_semantics() {
        let rb = rule_base(standard_rules());
        let inputs = CrispInputs::new().with("distance", 30.0).with("speed", 60.0);
        let coarse = Universe::new(0.0, 100.0, 5.0).unwrap();
        let fine = Universe::new(0.0, 100.0, 0.25).unwrap();
        let a = infer_detailed(&rb, &inputs, &coarse).unwrap();
        let b = infer_detailed(&rb, &inputs, &fine).unwrap();
        assert_eq!(a.aggregate.points().len(), 21);
        assert_eq!(b.aggregate.points().len(), 401);
        assert!((a.output - b.output).abs() < 5.0);
    }

    #[test]
    fn test_repeated_inference_is_deterministic() {
        let inputs = CrispInputs::new().with("distance", 37.5).with("speed", 62.0);
        let first = infer(&rule_base(standard_rules()), &inputs).unwrap();
        let second = infer(&rule_base(standard_rules()), &inputs).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    proptest! {
        #[test]
        fn prop_rule_order_does_not_matter(
            d in 0.0f64..100.0,
            s in 0.0f64..100.0,
            order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        ) {
            let rb = rule_base(standard_rules());
            let shuffled = rb.reordered(&order).unwrap();
            let inputs = CrispInputs::new().with("distance", d).with("speed", s);
            let grid = Universe::new(0.0, 100.0, 1.0).unwrap();

            match (infer_detailed(&rb, &inputs, &grid), infer_detailed(&shuffled, &inputs, &grid)) {
                (Ok(a), Ok(b)) => {
                    prop_assert_eq!(&a.aggregate, &b.aggregate);
                    prop_assert!((a.output - b.output).abs() < 1e-9);
                }
                (Err(a), Err(b)) => prop_assert_eq!(a.code, b.code),
                _ => prop_assert!(false, "order changed the outcome"),
            }
        }

        #[test]
        fn prop_output_within_universe(d in -50.0f64..150.0, s in -50.0f64..150.0) {
            let rb = rule_base(standard_rules());
            let inputs = CrispInputs::new().with("distance", d).with("speed", s);
            if let Ok(out) = infer(&rb, &inputs) {
                prop_assert!((0.0..=100.0).contains(&out));
            }
        }
    }
}
