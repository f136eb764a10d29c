//! Mamdani fuzzy inference
//!
//! Leaf-first:
//! - [`universe`] - sampled numeric ranges
//! - [`membership`] - truth degrees and piecewise-linear membership functions
//! - [`registry`] - linguistic variables and their named sets
//! - [`rule`] - antecedent trees, rules and the validated rule base
//! - [`inference`] - firing, max-aggregation and centroid defuzzification
//! - [`decision`] - labeled action bands
//! - [`engine`] - the immutable facade tying them together
//!
//! # Usage
//!
//! ```ignore
//! use fuzzdrive::fuzzy::*;
//!
//! let mut registry = VariableRegistry::new();
//! registry.declare_variable("speed", Universe::new(0.0, 100.0, 1.0)?)?;
//! registry.add_set("speed", "high", MembershipFunction::triangular(50.0, 100.0, 100.0)?)?;
//! // ... declare the consequent "action" with its sets
//!
//! let mut rules = RuleBase::builder(registry);
//! rules.add_rule(Rule::new(Antecedent::is("speed", "high"), Consequent::new("action", "brake")))?;
//! let engine = Engine::new(rules.build()?, bands)?;
//! let decision = engine.evaluate(&CrispInputs::new().with("speed", 90.0))?;
//! ```

pub mod decision;
pub mod engine;
pub mod inference;
pub mod membership;
pub mod registry;
pub mod rule;
pub mod universe;

pub use decision::{classify, ActionBand, ActionBands, Closed};
pub use engine::{evaluate, Engine, Evaluation};
pub use inference::{aggregate, infer, infer_detailed, AggregatedSet, CrispInputs, Inference, RuleActivation};
pub use membership::{Degree, MembershipFunction};
pub use registry::{LinguisticVariable, VariableRegistry};
pub use rule::{Antecedent, Consequent, Rule, RuleBase, RuleBaseBuilder};
pub use universe::Universe;
