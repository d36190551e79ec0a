//! Ground fact encoding: schema + table → ordered ASP facts.
//!
//! Every cell becomes one `data(value, field, row)` fact and every field one
//! `fieldtype(field, type)` fact, in row-then-field order. Coercions applied
//! on the way are lossy but deterministic, and each one is recorded in the
//! fact set's coercion log as well as traced.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::schema::Schema;
use crate::table::{Table, Value};

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

// ---------------------------------------------------------------------------
// Terms and facts
// ---------------------------------------------------------------------------

/// One argument of a ground fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// Integer constant.
    Int(i64),
    /// Bare lowercase identifier, e.g. `gene` or `nominal`.
    Sym(String),
    /// Quoted string literal for values that are not identifier-shaped.
    Str(String),
}

impl Term {
    /// Build a symbol term, validating the identifier shape.
    pub fn sym(text: impl Into<String>) -> EncodeResult<Term> {
        let text = text.into();
        if SYMBOL_RE.is_match(&text) {
            Ok(Term::Sym(text))
        } else {
            Err(EncodeError::InvalidSymbol { text })
        }
    }

    /// Coerce arbitrary text into a term: identifier-shaped text (after
    /// lowercasing) becomes a bare symbol, anything else a quoted literal.
    pub fn from_text(text: &str) -> Term {
        let lowered = text.to_lowercase();
        if SYMBOL_RE.is_match(&lowered) {
            Term::Sym(lowered)
        } else {
            Term::Str(text.to_string())
        }
    }

    /// Parse a term from solver output: integer, quoted literal, or symbol.
    pub fn parse(raw: &str) -> Term {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Term::Int(i);
        }
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            return Term::Str(unescape(&raw[1..raw.len() - 1]));
        }
        Term::Sym(raw.to_string())
    }

    /// The term's text content, unquoted.
    pub fn as_text(&self) -> String {
        match self {
            Term::Int(i) => i.to_string(),
            Term::Sym(s) | Term::Str(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Int(i) => write!(f, "{i}"),
            Term::Sym(s) => write!(f, "{s}"),
            Term::Str(s) => write!(f, "\"{}\"", escape(s)),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// A ground (variable-free) fact, e.g. `data(41, expr, 0).`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    predicate: String,
    args: Vec<Term>,
}

impl Fact {
    /// Build a fact, validating the predicate shape.
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> EncodeResult<Fact> {
        let predicate = predicate.into();
        if !SYMBOL_RE.is_match(&predicate) {
            return Err(EncodeError::InvalidSymbol { text: predicate });
        }
        Ok(Fact { predicate, args })
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}.", self.predicate);
        }
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ").")
    }
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// A lossy, deterministic transformation applied during encoding.
///
/// The fact language has no floating-point values, so floats are truncated
/// toward zero. Truncations are never silent: each is recorded here and
/// emitted as a trace event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coercion {
    FloatTruncated {
        field: String,
        row: usize,
        original: f64,
        truncated: i64,
    },
}

// ---------------------------------------------------------------------------
// Fact sets
// ---------------------------------------------------------------------------

/// An ordered sequence of ground facts plus the coercion log produced while
/// encoding them. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    facts: Vec<Fact>,
    coercions: Vec<Coercion>,
}

impl FactSet {
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Lossy coercions applied during encoding, in emission order.
    pub fn coercions(&self) -> &[Coercion] {
        &self.coercions
    }

    /// Render the facts as program text, one per line.
    pub fn to_program_text(&self) -> String {
        let mut out = String::new();
        for fact in &self.facts {
            out.push_str(&fact.to_string());
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a (schema, table) pair into a fact set.
///
/// For each row `r` and each field `f` in schema order, one
/// `data(value, f, r)` fact; nulls emit nothing. Then one
/// `fieldtype(f, type)` fact per field. Identical inputs yield
/// bit-identical output.
pub fn encode_facts(schema: &Schema, table: &Table) -> EncodeResult<FactSet> {
    if schema.len() != table.fields().len()
        || schema
            .fields()
            .iter()
            .zip(table.fields())
            .any(|(info, name)| info.name != *name)
    {
        return Err(EncodeError::SchemaMismatch {
            message: format!(
                "schema has fields [{}], table has [{}]",
                schema
                    .fields()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                table.fields().join(", ")
            ),
        });
    }

    // Field names must survive symbolization without colliding.
    let mut field_syms: Vec<String> = Vec::with_capacity(schema.len());
    for info in schema.fields() {
        let sym = sanitize_field(&info.name);
        if field_syms.contains(&sym) {
            return Err(EncodeError::DuplicateField { name: sym });
        }
        field_syms.push(sym);
    }

    let mut facts = Vec::new();
    let mut coercions = Vec::new();

    for (row_idx, row) in table.rows().enumerate() {
        for (field_idx, info) in schema.fields().iter().enumerate() {
            let value = &row[field_idx];
            let term = match encode_value(value, &info.name, row_idx, &mut coercions)? {
                Some(term) => term,
                None => continue, // null cell: no fact
            };
            facts.push(Fact::new(
                "data",
                vec![term, Term::Sym(field_syms[field_idx].clone()), Term::Int(row_idx as i64)],
            )?);
        }
    }

    for (field_idx, info) in schema.fields().iter().enumerate() {
        facts.push(Fact::new(
            "fieldtype",
            vec![
                Term::Sym(field_syms[field_idx].clone()),
                Term::Sym(info.field_type.to_string()),
            ],
        )?);
    }

    tracing::debug!(
        facts = facts.len(),
        coercions = coercions.len(),
        rows = table.row_count(),
        "encoded table into fact set"
    );

    Ok(FactSet { facts, coercions })
}

/// Encode one cell. Returns `None` for null cells (omitted, no fact).
fn encode_value(
    value: &Value,
    field: &str,
    row: usize,
    coercions: &mut Vec<Coercion>,
) -> EncodeResult<Option<Term>> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => Ok(Some(Term::Int(*i))),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(EncodeError::UnsupportedValue {
                    field: field.to_string(),
                    row,
                    message: format!("non-finite float {f}"),
                });
            }
            let truncated = f.trunc() as i64;
            tracing::debug!(field, row, original = *f, truncated, "float truncated toward zero");
            coercions.push(Coercion::FloatTruncated {
                field: field.to_string(),
                row,
                original: *f,
                truncated,
            });
            Ok(Some(Term::Int(truncated)))
        }
        // Booleans encode as a fixed pair of nominal literals.
        Value::Bool(b) => Ok(Some(Term::Sym(if *b { "true" } else { "false" }.into()))),
        Value::Str(s) => Ok(Some(Term::from_text(s))),
    }
}

/// Deterministically map a field name to a fact-language symbol: lowercase,
/// non-identifier characters to `_`, leading non-letter prefixed with `f_`.
pub fn sanitize_field(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || !out.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        format!("f_{out}")
    } else {
        out
    }
}
