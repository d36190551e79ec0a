//! Constraint programs: ordered fact and rule sequences handed to the solver.
//!
//! Caller-supplied rules are an opaque mini-language from the reasoner's point
//! of view, but each line is checked for syntactic well-formedness at
//! construction time so malformed programs fail here, not inside the external
//! process.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::facts::{Fact, FactSet};

/// One validated line of a constraint program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgramLine {
    /// A ground fact built through the typed [`Fact`] constructor.
    Fact(Fact),
    /// A caller-supplied rule or directive, validated for surface syntax only.
    Rule(String),
}

impl std::fmt::Display for ProgramLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramLine::Fact(fact) => write!(f, "{fact}"),
            ProgramLine::Rule(rule) => write!(f, "{rule}"),
        }
    }
}

/// An ordered sequence of program lines: encoded facts plus caller constraints.
///
/// Assembled once per solve attempt; the solver receives `to_source()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintProgram {
    lines: Vec<ProgramLine>,
}

impl ConstraintProgram {
    pub fn new() -> ConstraintProgram {
        ConstraintProgram::default()
    }

    /// Start a program from an encoded fact set.
    pub fn from_facts(facts: &FactSet) -> ConstraintProgram {
        let lines = facts
            .facts()
            .iter()
            .cloned()
            .map(ProgramLine::Fact)
            .collect();
        ConstraintProgram { lines }
    }

    /// Append all facts from a fact set.
    pub fn extend_facts(&mut self, facts: &FactSet) {
        self.lines
            .extend(facts.facts().iter().cloned().map(ProgramLine::Fact));
    }

    /// Append a single fact.
    pub fn push_fact(&mut self, fact: Fact) {
        self.lines.push(ProgramLine::Fact(fact));
    }

    /// Append a rule string after validating its surface syntax.
    pub fn push_rule(&mut self, rule: impl Into<String>) -> EncodeResult<()> {
        let rule = rule.into();
        validate_rule(&rule)?;
        self.lines.push(ProgramLine::Rule(rule));
        Ok(())
    }

    /// Append several rule strings; fails on the first malformed one.
    pub fn push_rules<I, S>(&mut self, rules: I) -> EncodeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for rule in rules {
            self.push_rule(rule)?;
        }
        Ok(())
    }

    pub fn lines(&self) -> &[ProgramLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the full program source, one line per program line.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    /// Content fingerprint, usable as a memoization key by callers that want
    /// to cache results per program.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.to_source().hash(&mut hasher);
        hasher.finish()
    }
}

/// Surface-syntax checks for a rule line: non-empty, terminated with `.`,
/// balanced brackets outside string literals, no unterminated literal.
fn validate_rule(rule: &str) -> EncodeResult<()> {
    let malformed = |reason: &str| EncodeError::MalformedRule {
        line: rule.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = rule.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty line"));
    }
    if !trimmed.ends_with('.') {
        return Err(malformed("missing terminating '.'"));
    }

    let mut parens = 0i32;
    let mut braces = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in trimmed.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => parens += 1,
            ')' => parens -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            _ => {}
        }
        if parens < 0 || braces < 0 {
            return Err(malformed("unbalanced brackets"));
        }
    }
    if in_string {
        return Err(malformed("unterminated string literal"));
    }
    if parens != 0 || braces != 0 {
        return Err(malformed("unbalanced brackets"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Term;

    #[test]
    fn facts_and_rules_render_in_order() {
        let mut program = ConstraintProgram::new();
        program.push_fact(Fact::new("gene", vec![Term::Str("BRCA1".into())]).unwrap());
        program
            .push_rule("important(G) :- gene(G).")
            .unwrap();

        let source = program.to_source();
        let lines: Vec<&str> = source.lines().collect();
        assert_eq!(lines[0], "gene(\"BRCA1\").");
        assert_eq!(lines[1], "important(G) :- gene(G).");
    }

    #[test]
    fn rule_without_terminator_rejected() {
        let mut program = ConstraintProgram::new();
        let err = program.push_rule("a :- b").unwrap_err();
        assert!(matches!(err, EncodeError::MalformedRule { .. }));
    }

    #[test]
    fn unbalanced_parens_rejected() {
        let mut program = ConstraintProgram::new();
        assert!(program.push_rule("p(a :- q(b).").is_err());
        assert!(program.push_rule("p(a)) :- q(b).").is_err());
    }

    #[test]
    fn unterminated_string_rejected() {
        let mut program = ConstraintProgram::new();
        assert!(program.push_rule("p(\"oops).").is_err());
    }

    #[test]
    fn brackets_inside_strings_ignored() {
        let mut program = ConstraintProgram::new();
        program.push_rule("p(\"(((\").").unwrap();
    }

    #[test]
    fn minimize_directive_accepted() {
        let mut program = ConstraintProgram::new();
        program
            .push_rule("#minimize { W,F : soft(F), soft_weight(F, W) }.")
            .unwrap();
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = ConstraintProgram::new();
        a.push_rule("p(1).").unwrap();
        let mut b = ConstraintProgram::new();
        b.push_rule("p(1).").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.push_rule("p(2).").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
