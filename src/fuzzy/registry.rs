//! Variable registry
//!
//! Holds every linguistic variable and its named fuzzy sets. The registry is
//! mutable only during the declaration phase; after [`VariableRegistry::freeze`]
//! every declaration call fails with `RegistryFrozen` and the registry can be
//! shared read-only across threads.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{EngineError, EngineResult, ErrorCode};

use super::membership::{Degree, MembershipFunction};
use super::universe::Universe;

/// A named quantity described by overlapping fuzzy sets
#[derive(Debug, Clone, Serialize)]
pub struct LinguisticVariable {
    name: String,
    universe: Universe,
    sets: IndexMap<String, MembershipFunction>,
}

impl LinguisticVariable {
    pub fn new(name: impl Into<String>, universe: Universe) -> Self {
        Self {
            name: name.into(),
            universe,
            sets: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Set names in declaration order
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn set(&self, name: &str) -> Option<&MembershipFunction> {
        self.sets.get(name)
    }

    pub fn has_set(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Membership of `value` in set `set`; the value is clamped into the universe first
    pub fn degree(&self, set: &str, value: f64) -> EngineResult<Degree> {
        let mf = self
            .sets
            .get(set)
            .ok_or_else(|| EngineError::unknown_set(&self.name, set))?;
        Ok(mf.evaluate(self.universe.clamp(value)))
    }

    /// Membership of `value` in every set, in declaration order
    pub fn fuzzify(&self, value: f64) -> Vec<(&str, Degree)> {
        let x = self.universe.clamp(value);
        self.sets
            .iter()
            .map(|(name, mf)| (name.as_str(), mf.evaluate(x)))
            .collect()
    }

    /// The set with the highest membership (first declared wins ties)
    pub fn dominant_set(&self, value: f64) -> Option<(&str, Degree)> {
        self.fuzzify(value)
            .into_iter()
            .fold(None, |best, (name, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((name, d)),
            })
    }
}

/// Registry of linguistic variables
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableRegistry {
    variables: IndexMap<String, LinguisticVariable>,
    #[serde(skip)]
    frozen: bool,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty variable
    pub fn declare_variable(&mut self, name: impl Into<String>, universe: Universe) -> EngineResult<()> {
        let name = name.into();
        self.ensure_open()?;
        if self.variables.contains_key(&name) {
            return Err(EngineError::duplicate_variable(&name));
        }
        tracing::trace!(variable = %name, min = universe.min(), max = universe.max(), "declared variable");
        self.variables.insert(name.clone(), LinguisticVariable::new(name, universe));
        Ok(())
    }

    /// Attach a named membership function to a declared variable
    pub fn add_set(
        &mut self,
        variable: &str,
        set_name: impl Into<String>,
        membership: MembershipFunction,
    ) -> EngineResult<()> {
        let set_name = set_name.into();
        self.ensure_open()?;
        let var = self
            .variables
            .get_mut(variable)
            .ok_or_else(|| EngineError::unknown_variable(variable))?;
        if var.sets.contains_key(&set_name) {
            return Err(EngineError::duplicate_set(variable, &set_name));
        }
        var.sets.insert(set_name, membership);
        Ok(())
    }

    /// Membership degree of `crisp_value` in `variable`'s set `set_name`
    pub fn degree_of(&self, variable: &str, set_name: &str, crisp_value: f64) -> EngineResult<Degree> {
        self.variable(variable)?.degree(set_name, crisp_value)
    }

    /// Forbid further declarations
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn variable(&self, name: &str) -> EngineResult<&LinguisticVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| EngineError::unknown_variable(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Variables in declaration order
    pub fn variables(&self) -> impl Iterator<Item = &LinguisticVariable> {
        self.variables.values()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        crate::engine_ensure!(
            !self.frozen,
            ErrorCode::RegistryFrozen,
            "registry is frozen; declarations are no longer accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed_registry() -> VariableRegistry {
        let mut reg = VariableRegistry::new();
        reg.declare_variable("speed", Universe::new(0.0, 100.0, 1.0).unwrap()).unwrap();
        reg.add_set("speed", "low", MembershipFunction::triangular(0.0, 0.0, 50.0).unwrap()).unwrap();
        reg.add_set("speed", "medium", MembershipFunction::triangular(0.0, 50.0, 100.0).unwrap()).unwrap();
        reg.add_set("speed", "high", MembershipFunction::triangular(50.0, 100.0, 100.0).unwrap()).unwrap();
        reg
    }

    #[test]
    fn test_duplicate_variable() {
        let mut reg = speed_registry();
        let err = reg
            .declare_variable("speed", Universe::new(0.0, 10.0, 1.0).unwrap())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateVariable);
    }

    #[test]
    fn test_add_set_errors() {
        let mut reg = speed_registry();
        let tri = MembershipFunction::triangular(0.0, 1.0, 2.0).unwrap();
        assert_eq!(reg.add_set("speed", "low", tri).unwrap_err().code, ErrorCode::DuplicateSet);
        assert_eq!(reg.add_set("distance", "far", tri).unwrap_err().code, ErrorCode::UnknownVariable);
    }

    #[test]
    fn test_degree_of() {
        let reg = speed_registry();
        assert!((reg.degree_of("speed", "medium", 25.0).unwrap().value() - 0.5).abs() < 1e-12);
        assert_eq!(reg.degree_of("speed", "warp", 1.0).unwrap_err().code, ErrorCode::UnknownSet);
        assert_eq!(reg.degree_of("rpm", "low", 1.0).unwrap_err().code, ErrorCode::UnknownVariable);
    }

    #[test]
    fn test_degree_clamps_outside_universe() {
        let reg = speed_registry();
        assert_eq!(reg.degree_of("speed", "high", 130.0).unwrap(), Degree::ONE);
        assert_eq!(reg.degree_of("speed", "low", -20.0).unwrap(), Degree::ONE);
        assert_eq!(reg.degree_of("speed", "medium", 130.0).unwrap(), Degree::ZERO);
    }

    #[test]
    fn test_freeze_blocks_declarations() {
        let mut reg = speed_registry();
        reg.freeze();
        assert!(reg.is_frozen());
        let err = reg
            .declare_variable("distance", Universe::new(0.0, 100.0, 1.0).unwrap())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RegistryFrozen);
        let tri = MembershipFunction::triangular(0.0, 1.0, 2.0).unwrap();
        assert_eq!(reg.add_set("speed", "crawl", tri).unwrap_err().code, ErrorCode::RegistryFrozen);
        // reads still work
        assert!(reg.degree_of("speed", "low", 0.0).is_ok());
    }

    #[test]
    fn test_fuzzify_and_dominant_set() {
        let reg = speed_registry();
        let speed = reg.variable("speed").unwrap();
        let names: Vec<&str> = speed.fuzzify(75.0).iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["low", "medium", "high"]);
        assert_eq!(speed.dominant_set(90.0).unwrap().0, "high");
        // tie between medium and high at 75: first declared wins
        assert_eq!(speed.dominant_set(75.0).unwrap().0, "medium");
    }
}
