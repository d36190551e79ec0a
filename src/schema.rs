//! Schema inference from tabular data.
//!
//! Profiles each column of a [`Table`](crate::table::Table) and assigns a
//! semantic type (nominal, ordinal, quantitative, temporal) plus per-field
//! statistics. Inference runs once per table and is deterministic: the same
//! table always yields the same schema.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::table::{Table, Value};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Semantic type of a field, driving how the reasoner may encode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Nominal,
    Ordinal,
    Quantitative,
    Temporal,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldType::Nominal => "nominal",
            FieldType::Ordinal => "ordinal",
            FieldType::Quantitative => "quantitative",
            FieldType::Temporal => "temporal",
        };
        write!(f, "{s}")
    }
}

/// Per-field statistics gathered during inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Distinct non-null values.
    pub cardinality: usize,
    /// Minimum numeric value, for numeric fields.
    pub min: Option<f64>,
    /// Maximum numeric value, for numeric fields.
    pub max: Option<f64>,
    /// Number of null cells.
    pub null_count: usize,
}

/// One inferred field: name, semantic type, statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    pub stats: FieldStats,
}

/// An ordered, immutable description of a table's fields.
///
/// Field names are unique; order matches the table's field declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldInfo>,
}

impl Schema {
    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Configuration for schema inference.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    /// Integer-valued fields with fewer distinct values than this are
    /// ordinal rather than quantitative (default: 20).
    pub ordinal_cardinality_threshold: usize,
    /// chrono format strings tried, in order, for temporal detection.
    pub temporal_formats: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            ordinal_cardinality_threshold: 20,
            temporal_formats: vec![
                "%Y-%m-%d".into(),
                "%Y-%m-%dT%H:%M:%S".into(),
                "%Y-%m-%d %H:%M:%S".into(),
                "%m/%d/%Y".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Infer a schema from a table.
///
/// Per-field policy, in order:
/// 1. all non-null values numeric → quantitative, unless integer-valued with
///    cardinality below the configured threshold → ordinal
/// 2. all non-null values parse under a configured temporal format → temporal
/// 3. otherwise → nominal
///
/// A table with no rows or no fields cannot be profiled and fails with
/// `EmptyInput`. An all-null column falls back to nominal.
pub fn infer_schema(table: &Table, config: &SchemaConfig) -> EncodeResult<Schema> {
    if table.fields().is_empty() {
        return Err(EncodeError::EmptyInput {
            what: "fields".into(),
        });
    }
    if table.row_count() == 0 {
        return Err(EncodeError::EmptyInput { what: "rows".into() });
    }

    let mut fields = Vec::with_capacity(table.fields().len());
    for (idx, name) in table.fields().iter().enumerate() {
        let info = infer_field(table, idx, name, config);
        tracing::debug!(
            field = %info.name,
            field_type = %info.field_type,
            cardinality = info.stats.cardinality,
            nulls = info.stats.null_count,
            "inferred field type"
        );
        fields.push(info);
    }

    Ok(Schema { fields })
}

fn infer_field(table: &Table, idx: usize, name: &str, config: &SchemaConfig) -> FieldInfo {
    let mut null_count = 0usize;
    let mut distinct: Vec<String> = Vec::new();
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut all_numeric = true;
    let mut all_integer = true;
    let mut all_temporal = true;
    let mut non_null = 0usize;

    for value in table.column(idx) {
        if value.is_null() {
            null_count += 1;
            continue;
        }
        non_null += 1;

        let repr = value.to_string();
        if !distinct.contains(&repr) {
            distinct.push(repr);
        }

        match value.as_f64() {
            Some(x) => {
                min = Some(min.map_or(x, |m| m.min(x)));
                max = Some(max.map_or(x, |m| m.max(x)));
                if !value.is_integer_valued() {
                    all_integer = false;
                }
            }
            None => {
                all_numeric = false;
                all_integer = false;
            }
        }

        if !is_temporal(value, &config.temporal_formats) {
            all_temporal = false;
        }
    }

    let cardinality = distinct.len();
    let field_type = if non_null == 0 {
        // All-null column: nothing to profile; nominal is the safe floor.
        FieldType::Nominal
    } else if all_numeric {
        if all_integer && cardinality < config.ordinal_cardinality_threshold {
            FieldType::Ordinal
        } else {
            FieldType::Quantitative
        }
    } else if all_temporal {
        FieldType::Temporal
    } else {
        FieldType::Nominal
    };

    let (min, max) = if all_numeric { (min, max) } else { (None, None) };

    FieldInfo {
        name: name.to_string(),
        field_type,
        stats: FieldStats {
            cardinality,
            min,
            max,
            null_count,
        },
    }
}

/// A value counts as temporal only if it is text parsing under one of the
/// configured formats.
fn is_temporal(value: &Value, formats: &[String]) -> bool {
    let Value::Str(s) = value else {
        return false;
    };
    let s = s.trim();
    formats.iter().any(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).is_ok() || NaiveDate::parse_from_str(s, fmt).is_ok()
    })
}
