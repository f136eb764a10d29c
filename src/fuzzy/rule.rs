//! Rules and firing strength
//!
//! A rule pairs an antecedent expression tree with a single consequent:
//!
//! ```text
//! IF distance IS close AND (speed IS high OR speed IS medium) THEN action IS brake
//! ```
//!
//! The tree is explicit (`Is` leaves, `And`/`Or` nodes) and is validated against
//! the registry when the rule enters a [`RuleBase`]. Evaluation uses the
//! minimum t-norm for AND and the maximum t-conorm for OR.

use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult, ErrorCode};

use super::inference::CrispInputs;
use super::membership::Degree;
use super::registry::VariableRegistry;

// ============================================================================
// Antecedent Expressions
// ============================================================================

/// Antecedent expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Antecedent {
    /// `variable IS set`
    Is { variable: String, set: String },
    /// Fuzzy AND (min)
    And(Box<Antecedent>, Box<Antecedent>),
    /// Fuzzy OR (max)
    Or(Box<Antecedent>, Box<Antecedent>),
}

impl Antecedent {
    /// Leaf: `variable IS set`
    pub fn is(variable: impl Into<String>, set: impl Into<String>) -> Self {
        Antecedent::Is {
            variable: variable.into(),
            set: set.into(),
        }
    }

    pub fn and(self, other: Antecedent) -> Self {
        Antecedent::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Antecedent) -> Self {
        Antecedent::Or(Box::new(self), Box::new(other))
    }

    /// Left-fold a non-empty list with AND
    pub fn all(items: impl IntoIterator<Item = Antecedent>) -> Option<Self> {
        items.into_iter().reduce(Antecedent::and)
    }

    /// Left-fold a non-empty list with OR
    pub fn any(items: impl IntoIterator<Item = Antecedent>) -> Option<Self> {
        items.into_iter().reduce(Antecedent::or)
    }

    /// Every `(variable, set)` leaf, left to right
    pub fn leaves(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Antecedent::Is { variable, set } => out.push((variable.as_str(), set.as_str())),
            Antecedent::And(l, r) | Antecedent::Or(l, r) => {
                l.collect_leaves(out);
                r.collect_leaves(out);
            }
        }
    }

    /// Recursively evaluate the tree against crisp inputs
    pub fn evaluate(&self, registry: &VariableRegistry, inputs: &CrispInputs) -> EngineResult<Degree> {
        match self {
            Antecedent::Is { variable, set } => {
                let value = inputs
                    .get(variable)
                    .ok_or_else(|| EngineError::missing_input(variable))?;
                registry.degree_of(variable, set, value)
            }
            Antecedent::And(l, r) => {
                Ok(l.evaluate(registry, inputs)?.and(r.evaluate(registry, inputs)?))
            }
            Antecedent::Or(l, r) => {
                Ok(l.evaluate(registry, inputs)?.or(r.evaluate(registry, inputs)?))
            }
        }
    }
}

impl fmt::Display for Antecedent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antecedent::Is { variable, set } => write!(f, "{} IS {}", variable, set),
            Antecedent::And(l, r) => {
                write_operand(f, l)?;
                write!(f, " AND ")?;
                write_operand(f, r)
            }
            Antecedent::Or(l, r) => write!(f, "{} OR {}", l, r),
        }
    }
}

/// OR binds looser than AND, so OR operands of an AND need parentheses
fn write_operand(f: &mut fmt::Formatter<'_>, node: &Antecedent) -> fmt::Result {
    match node {
        Antecedent::Or(..) => write!(f, "({})", node),
        _ => write!(f, "{}", node),
    }
}

// ============================================================================
// Rules
// ============================================================================

/// `variable IS set` on the consequent side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consequent {
    pub variable: String,
    pub set: String,
}

impl Consequent {
    pub fn new(variable: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            set: set.into(),
        }
    }
}

/// A fuzzy rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Optional label used in diagnostics
    pub name: Option<String>,
    pub antecedent: Antecedent,
    pub consequent: Consequent,
    /// Multiplier on the firing strength, in [0, 1]
    pub weight: f64,
}

impl Rule {
    pub fn new(antecedent: Antecedent, consequent: Consequent) -> Self {
        Self {
            name: None,
            antecedent,
            consequent,
            weight: 1.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Degree to which the antecedent holds, before weighting
    pub fn firing_strength(&self, registry: &VariableRegistry, inputs: &CrispInputs) -> EngineResult<Degree> {
        self.antecedent.evaluate(registry, inputs)
    }

    /// Label for diagnostics: the name if any, otherwise the rule text
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IF {} THEN {} IS {}",
            self.antecedent, self.consequent.variable, self.consequent.set
        )
    }
}

// ============================================================================
// Rule Base
// ============================================================================

/// A validated, immutable set of rules over a frozen registry
#[derive(Debug, Clone)]
pub struct RuleBase {
    registry: Arc<VariableRegistry>,
    rules: Vec<Rule>,
    consequent: String,
}

impl RuleBase {
    /// Start a rule base; the registry is frozen on entry
    pub fn builder(mut registry: VariableRegistry) -> RuleBaseBuilder {
        registry.freeze();
        RuleBaseBuilder {
            registry,
            rules: Vec::new(),
            consequent: None,
        }
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Name of the single consequent variable
    pub fn consequent_variable(&self) -> &str {
        &self.consequent
    }

    /// Declared variables other than the consequent, in declaration order
    pub fn antecedent_variables(&self) -> impl Iterator<Item = &str> {
        self.registry
            .variables()
            .map(|v| v.name())
            .filter(move |name| *name != self.consequent)
    }

    /// Firing strength of `rule` (unweighted) against `inputs`
    pub fn firing_strength(&self, rule: &Rule, inputs: &CrispInputs) -> EngineResult<Degree> {
        rule.firing_strength(&self.registry, inputs)
    }

    /// Same rules in a different order; used to check order independence
    pub fn reordered(&self, order: &[usize]) -> EngineResult<RuleBase> {
        crate::engine_ensure!(
            order.len() == self.rules.len(),
            ErrorCode::InternalError,
            "permutation has {} entries for {} rules",
            order.len(),
            self.rules.len()
        );
        let mut seen = vec![false; self.rules.len()];
        let mut rules = Vec::with_capacity(self.rules.len());
        for &i in order {
            crate::engine_ensure!(
                i < seen.len() && !seen[i],
                ErrorCode::InternalError,
                "invalid permutation index {}",
                i
            );
            seen[i] = true;
            rules.push(self.rules[i].clone());
        }
        Ok(RuleBase {
            registry: Arc::clone(&self.registry),
            rules,
            consequent: self.consequent.clone(),
        })
    }
}

/// Collects and validates rules before producing a [`RuleBase`]
#[derive(Debug)]
pub struct RuleBaseBuilder {
    registry: VariableRegistry,
    rules: Vec<Rule>,
    consequent: Option<String>,
}

impl RuleBaseBuilder {
    /// Validate `rule` against the registry and the consequent chosen so far
    pub fn add_rule(&mut self, rule: Rule) -> EngineResult<&mut Self> {
        self.check_consequent(&rule)?;
        self.check_antecedent(&rule)?;
        crate::engine_ensure!(
            (0.0..=1.0).contains(&rule.weight),
            ErrorCode::InvalidRuleWeight,
            "rule weight {} is outside [0, 1] in '{}'",
            rule.weight,
            rule
        );
        if self.consequent.is_none() {
            self.consequent = Some(rule.consequent.variable.clone());
        }
        self.rules.push(rule);
        Ok(self)
    }

    /// Add every rule, stopping at the first invalid one
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> EngineResult<&mut Self> {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(self)
    }

    pub fn build(self) -> EngineResult<RuleBase> {
        let consequent = match self.consequent {
            Some(c) if !self.rules.is_empty() => c,
            _ => crate::engine_bail!(ErrorCode::EmptyRuleBase, "rule base has no rules"),
        };
        tracing::debug!(rules = self.rules.len(), consequent = %consequent, "rule base built");
        Ok(RuleBase {
            registry: Arc::new(self.registry),
            rules: self.rules,
            consequent,
        })
    }

    fn check_consequent(&self, rule: &Rule) -> EngineResult<()> {
        let Consequent { variable, set } = &rule.consequent;
        let var = self.registry.variable(variable).map_err(|_| {
            EngineError::invalid_consequent(format!("consequent variable '{}' is not declared", variable))
                .with_context("variable", variable.as_str())
        })?;
        if !var.has_set(set) {
            return Err(EngineError::invalid_consequent(format!(
                "consequent variable '{}' has no set named '{}'",
                variable, set
            ))
            .with_context("variable", variable.as_str())
            .with_context("set", set.as_str()));
        }
        match &self.consequent {
            Some(existing) if existing != variable => Err(EngineError::invalid_consequent(format!(
                "rule base already concludes on '{}'; '{}' would be a second consequent variable",
                existing, variable
            ))),
            _ => Ok(()),
        }
    }

    fn check_antecedent(&self, rule: &Rule) -> EngineResult<()> {
        for (variable, set) in rule.antecedent.leaves() {
            let var = self.registry.variable(variable)?;
            if !var.has_set(set) {
                return Err(EngineError::unknown_set(variable, set));
            }
            if variable == rule.consequent.variable || self.consequent.as_deref() == Some(variable) {
                return Err(EngineError::new(
                    ErrorCode::InvalidAntecedent,
                    format!("consequent variable '{}' cannot appear in an antecedent", variable),
                )
                .with_context("rule", rule.to_string()));
            }
        }
        Ok(())
    }
}
