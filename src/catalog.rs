//! Constraint catalog: the reusable knowledge base spliced into programs.
//!
//! Hard constraints prune ill-formed chart designs, helpers define the valid
//! vocabulary, and soft constraints carry named weights folded into one
//! minimize directive. A compact built-in set ships with the crate; users
//! can extend or replace it from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::program::ConstraintProgram;

/// A named, weighted soft constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftConstraint {
    /// Short name, referenced by `soft/2` atoms in the rule body.
    pub name: String,
    /// The rule deriving `soft(name, E)` atoms.
    pub rule: String,
    /// Penalty weight; higher weights are avoided first.
    pub weight: i64,
}

/// The constraint knowledge base: hard rules, helper definitions, and
/// weighted soft constraints, parsed from `catalog.toml` or built in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintCatalog {
    /// Integrity constraints; a violating design is no model at all.
    #[serde(default)]
    pub hard: Vec<String>,
    /// Vocabulary definitions used by hard and soft rules.
    #[serde(default)]
    pub helpers: Vec<String>,
    /// Weighted preferences, applied through one minimize directive.
    #[serde(default)]
    pub soft: Vec<SoftConstraint>,
}

impl ConstraintCatalog {
    /// The built-in catalog over the answer vocabulary.
    pub fn builtin() -> ConstraintCatalog {
        ConstraintCatalog {
            helpers: vec![
                "valid_mark(point; bar; line; area; tick; rect).".into(),
                "valid_channel(x; y; color; size; shape; row; column).".into(),
                "valid_type(nominal; ordinal; quantitative; temporal).".into(),
            ],
            hard: vec![
                ":- mark(M), not valid_mark(M).".into(),
                ":- channel(_, C), not valid_channel(C).".into(),
                ":- type(E, T), channel(E, _), not valid_type(T).".into(),
                // One encoding per channel.
                ":- channel(E1, C), channel(E2, C), E1 != E2.".into(),
                // Binning an aggregated encoding is never well-formed.
                ":- bin(E, _), aggregate(E, _).".into(),
                // A log scale cannot include zero.
                ":- log(E), zero(E).".into(),
                ":- log(E), type(E, T), T != quantitative.".into(),
            ],
            soft: vec![
                SoftConstraint {
                    name: "aggregate".into(),
                    rule: "soft(aggregate, E) :- aggregate(E, _).".into(),
                    weight: 1,
                },
                SoftConstraint {
                    name: "bin".into(),
                    rule: "soft(bin, E) :- bin(E, _).".into(),
                    weight: 2,
                },
                SoftConstraint {
                    name: "log_scale".into(),
                    rule: "soft(log_scale, E) :- log(E).".into(),
                    weight: 4,
                },
                SoftConstraint {
                    name: "high_cardinality_color".into(),
                    rule: "soft(high_cardinality_color, E) :- channel(E, color), type(E, quantitative).".into(),
                    weight: 3,
                },
            ],
        }
    }

    /// Parse a catalog from TOML text, validating every rule line.
    pub fn from_toml_str(input: &str) -> EncodeResult<ConstraintCatalog> {
        let catalog: ConstraintCatalog =
            toml::from_str(input).map_err(|e| EncodeError::Parse {
                format: "TOML".into(),
                message: e.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a `catalog.toml` file.
    pub fn from_path(path: &Path) -> EncodeResult<ConstraintCatalog> {
        let content = std::fs::read_to_string(path).map_err(|source| EncodeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Names of all soft constraints, in catalog order.
    pub fn soft_constraint_names(&self) -> Vec<&str> {
        self.soft.iter().map(|s| s.name.as_str()).collect()
    }

    /// Weight of a soft constraint by name.
    pub fn weight(&self, name: &str) -> Option<i64> {
        self.soft.iter().find(|s| s.name == name).map(|s| s.weight)
    }

    /// Splice the catalog into a program: helpers, hard rules, soft rules,
    /// per-name weight facts, and the closing minimize directive.
    pub fn append_to(&self, program: &mut ConstraintProgram) -> EncodeResult<()> {
        program.push_rules(self.helpers.iter().cloned())?;
        program.push_rules(self.hard.iter().cloned())?;
        for soft in &self.soft {
            program.push_rule(soft.rule.clone())?;
            program.push_rule(format!("soft_weight({}, {}).", soft.name, soft.weight))?;
        }
        if !self.soft.is_empty() {
            program.push_rule("#minimize { W,F,E : soft(F, E), soft_weight(F, W) }.")?;
        }
        Ok(())
    }

    /// Check every line through the program validator without emitting.
    fn validate(&self) -> EncodeResult<()> {
        let mut scratch = ConstraintProgram::new();
        self.append_to(&mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_well_formed() {
        let mut program = ConstraintProgram::new();
        ConstraintCatalog::builtin().append_to(&mut program).unwrap();
        assert!(!program.is_empty());
        assert!(program.to_source().contains("#minimize"));
    }

    #[test]
    fn soft_names_and_weights_exposed() {
        let catalog = ConstraintCatalog::builtin();
        assert!(catalog.soft_constraint_names().contains(&"bin"));
        assert_eq!(catalog.weight("bin"), Some(2));
        assert_eq!(catalog.weight("nonexistent"), None);
    }

    #[test]
    fn toml_round_trip() {
        let toml_src = r#"
hard = [":- mark(M), not valid_mark(M)."]
helpers = ["valid_mark(point; bar)."]

[[soft]]
name = "aggregate"
rule = "soft(aggregate, E) :- aggregate(E, _)."
weight = 1
"#;
        let catalog = ConstraintCatalog::from_toml_str(toml_src).unwrap();
        assert_eq!(catalog.hard.len(), 1);
        assert_eq!(catalog.soft_constraint_names(), vec!["aggregate"]);
    }

    #[test]
    fn malformed_rule_in_toml_rejected() {
        let toml_src = r#"hard = ["no terminator here"]"#;
        assert!(matches!(
            ConstraintCatalog::from_toml_str(toml_src).unwrap_err(),
            EncodeError::MalformedRule { .. }
        ));
    }

    #[test]
    fn empty_catalog_appends_nothing() {
        let mut program = ConstraintProgram::new();
        ConstraintCatalog::default().append_to(&mut program).unwrap();
        assert!(program.is_empty());
    }
}
