//! Answer-set decoding: raw solver models into structured mappings.
//!
//! A raw model is an unordered set of ground literals. Decoding buckets them
//! by predicate name into argument-tuple lists. Predicates outside the known
//! answer vocabulary are retained verbatim under their own key so callers can
//! inspect everything the solver derived. An empty model decodes to an empty
//! mapping; that is a valid terminal state, not an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::facts::Term;
use crate::solver::RawModel;

/// A decoded model: predicate name → list of argument tuples, plus the
/// model's optimization score when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnswerSet {
    predicates: BTreeMap<String, Vec<Vec<Term>>>,
    score: Option<i64>,
}

impl AnswerSet {
    /// All argument tuples of one predicate, in model order.
    pub fn tuples(&self, predicate: &str) -> &[Vec<Term>] {
        self.predicates
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The full predicate → tuples mapping.
    pub fn predicates(&self) -> &BTreeMap<String, Vec<Vec<Term>>> {
        &self.predicates
    }

    /// Optimization score, lower is better.
    pub fn score(&self) -> Option<i64> {
        self.score
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Number of decoded literals across all predicates.
    pub fn literal_count(&self) -> usize {
        self.predicates.values().map(Vec::len).sum()
    }
}

/// Decode one raw model into an answer set.
///
/// Literals that do not look like `pred(args)` are kept as zero-arity
/// entries under their own name rather than dropped.
pub fn decode_model(model: &RawModel) -> AnswerSet {
    let mut predicates: BTreeMap<String, Vec<Vec<Term>>> = BTreeMap::new();

    for literal in &model.literals {
        let (predicate, args) = split_literal(literal);
        predicates.entry(predicate).or_default().push(args);
    }

    AnswerSet {
        predicates,
        score: model.score,
    }
}

/// Split one ground literal into predicate name and parsed argument terms.
fn split_literal(literal: &str) -> (String, Vec<Term>) {
    let literal = literal.trim();
    let Some(open) = literal.find('(') else {
        // Zero-arity atom, e.g. `sat`.
        return (literal.to_string(), Vec::new());
    };
    if !literal.ends_with(')') {
        return (literal.to_string(), Vec::new());
    }

    let predicate = literal[..open].to_string();
    let body = &literal[open + 1..literal.len() - 1];
    let args = split_args(body).iter().map(|a| Term::parse(a)).collect();
    (predicate, args)
}

/// Split an argument body on top-level commas, respecting nested parentheses
/// and string literals.
fn split_args(body: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for c in body.chars() {
        if in_string {
            current.push(c);
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
            '"' => {
                in_string = true;
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current);
    }
    args.iter().map(|a| a.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::RawModel;

    #[test]
    fn buckets_by_predicate() {
        let model = RawModel::new(vec![
            "mark(point)".into(),
            "channel(e0,x)".into(),
            "field(e0,gene)".into(),
            "channel(e1,y)".into(),
        ]);
        let decoded = decode_model(&model);
        assert_eq!(decoded.tuples("mark").len(), 1);
        assert_eq!(decoded.tuples("channel").len(), 2);
        assert_eq!(
            decoded.tuples("field")[0],
            vec![Term::Sym("e0".into()), Term::Sym("gene".into())]
        );
    }

    #[test]
    fn unknown_predicates_retained() {
        let model = RawModel::new(vec!["exotic_marker(e0,42)".into()]);
        let decoded = decode_model(&model);
        assert_eq!(
            decoded.tuples("exotic_marker")[0],
            vec![Term::Sym("e0".into()), Term::Int(42)]
        );
    }

    #[test]
    fn empty_model_decodes_to_empty_mapping() {
        let decoded = decode_model(&RawModel::new(vec![]));
        assert!(decoded.is_empty());
        assert_eq!(decoded.literal_count(), 0);
    }

    #[test]
    fn zero_arity_atoms_keep_their_name() {
        let decoded = decode_model(&RawModel::new(vec!["sat".into()]));
        assert_eq!(decoded.tuples("sat"), &[Vec::<Term>::new()]);
    }

    #[test]
    fn quoted_arguments_with_commas_survive() {
        let model = RawModel::new(vec!["data(\"liver, left lobe\",tissue,0)".into()]);
        let decoded = decode_model(&model);
        assert_eq!(
            decoded.tuples("data")[0],
            vec![
                Term::Str("liver, left lobe".into()),
                Term::Sym("tissue".into()),
                Term::Int(0)
            ]
        );
    }

    #[test]
    fn nested_function_terms_stay_whole() {
        let model = RawModel::new(vec!["attribute((mark,type),m0,point)".into()]);
        let decoded = decode_model(&model);
        let tuple = &decoded.tuples("attribute")[0];
        assert_eq!(tuple.len(), 3);
        assert_eq!(tuple[0], Term::Sym("(mark,type)".into()));
    }

    #[test]
    fn score_carried_through() {
        let model = RawModel::new(vec!["mark(bar)".into()]).with_score(9);
        assert_eq!(decode_model(&model).score(), Some(9));
    }
}
