//! Tabular input model: typed cell values and row-major tables.
//!
//! Supports two input boundaries:
//! - **In-memory records**: a sequence of field → value mappings, one per row
//! - **File references**: `.csv` (header row + data rows) or `.json` (array of
//!   flat objects), resolved to the same in-memory form

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Whether this cell is null/missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this cell parses as a number (native numeric, or numeric text).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether this cell is integer-valued (an `Int`, or numeric text/float
    /// with no fractional part).
    pub fn is_integer_valued(&self) -> bool {
        match self {
            Value::Int(_) => true,
            Value::Float(f) => f.is_finite() && f.fract() == 0.0,
            Value::Str(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        }
    }

    fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            // Nested arrays/objects are not cell values.
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A row-major table with a fixed, ordered set of field names.
///
/// Field order is declaration order: header order for CSV, first-seen order
/// across records for JSON/in-memory input. Rows are dense — missing cells
/// are `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    fields: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from field → value records, one mapping per row.
    ///
    /// Field order is first-seen order across the records; fields absent from
    /// a record become null cells in that row.
    pub fn from_records(records: &[BTreeMap<String, Value>]) -> Table {
        let mut fields: Vec<String> = Vec::new();
        for record in records {
            for name in record.keys() {
                if !fields.iter().any(|f| f == name) {
                    fields.push(name.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                fields
                    .iter()
                    .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Table { fields, rows }
    }

    /// Parse a JSON array of flat objects into a table.
    pub fn from_json_str(input: &str) -> EncodeResult<Table> {
        let parsed: serde_json::Value =
            serde_json::from_str(input).map_err(|e| EncodeError::Parse {
                format: "JSON".into(),
                message: e.to_string(),
            })?;

        let array = parsed.as_array().ok_or_else(|| EncodeError::Parse {
            format: "JSON".into(),
            message: "top-level value must be an array of objects".into(),
        })?;

        let mut records = Vec::with_capacity(array.len());
        for (i, item) in array.iter().enumerate() {
            let obj = item.as_object().ok_or_else(|| EncodeError::Parse {
                format: "JSON".into(),
                message: format!("element {i} is not an object"),
            })?;

            let mut record = BTreeMap::new();
            for (key, raw) in obj {
                let value = Value::from_json(raw).ok_or_else(|| EncodeError::Parse {
                    format: "JSON".into(),
                    message: format!("field \"{key}\" in element {i} is nested; cells must be scalar"),
                })?;
                record.insert(key.clone(), value);
            }
            records.push(record);
        }

        // from_records sorts fields to map order; recover the declaration
        // order from the first object when it covers the whole field set.
        let mut table = Table::from_records(&records);
        if let Some(first) = array.first().and_then(|v| v.as_object()) {
            let declared: Vec<String> = first.keys().cloned().collect();
            let mapping: Option<Vec<usize>> = declared
                .iter()
                .map(|name| table.fields.iter().position(|f| f == name))
                .collect();
            if declared.len() == table.fields.len() {
                if let Some(mapping) = mapping {
                    let rows = table
                        .rows
                        .iter()
                        .map(|row| mapping.iter().map(|&i| row[i].clone()).collect())
                        .collect();
                    table = Table {
                        fields: declared,
                        rows,
                    };
                }
            }
        }
        Ok(table)
    }

    /// Parse delimited text into a table. The first non-empty, non-comment
    /// line is the header; cells are type-sniffed (int, float, bool, text).
    pub fn from_csv_str(input: &str, delimiter: char) -> EncodeResult<Table> {
        let mut lines = input.lines();

        let header_line = loop {
            match lines.next() {
                Some(line) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('#') {
                        break trimmed;
                    }
                }
                None => {
                    return Err(EncodeError::Parse {
                        format: "CSV".into(),
                        message: "no header line found".into(),
                    });
                }
            }
        };

        let fields: Vec<String> = header_line
            .split(delimiter)
            .map(|h| h.trim().trim_matches('"').to_string())
            .collect();
        if fields.is_empty() || fields.iter().all(|f| f.is_empty()) {
            return Err(EncodeError::Parse {
                format: "CSV".into(),
                message: "header line has no field names".into(),
            });
        }

        let mut rows = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let cells: Vec<&str> = line.split(delimiter).map(|c| c.trim()).collect();
            let row: Vec<Value> = (0..fields.len())
                .map(|i| sniff_cell(cells.get(i).copied().unwrap_or("")))
                .collect();
            rows.push(row);
        }

        Ok(Table { fields, rows })
    }

    /// Load a table from a file path, dispatching on the extension.
    pub fn from_path(path: &Path) -> EncodeResult<Table> {
        let content = std::fs::read_to_string(path).map_err(|source| EncodeError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Table::from_csv_str(&content, ','),
            Some("json") => Table::from_json_str(&content),
            _ => Err(EncodeError::UnsupportedExtension {
                path: path.display().to_string(),
            }),
        }
    }

    /// Ordered field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate rows in order. Each row is dense in field order.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// All values of one field, in row order.
    pub fn column(&self, field_idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[field_idx])
    }

    /// Content fingerprint for the optional schema/fact cache.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for field in &self.fields {
            field.hash(&mut hasher);
        }
        for row in &self.rows {
            for value in row {
                match value {
                    Value::Null => 0u8.hash(&mut hasher),
                    Value::Bool(b) => (1u8, b).hash(&mut hasher),
                    Value::Int(i) => (2u8, i).hash(&mut hasher),
                    Value::Float(f) => (3u8, f.to_bits()).hash(&mut hasher),
                    Value::Str(s) => (4u8, s).hash(&mut hasher),
                }
            }
        }
        hasher.finish()
    }
}

/// Sniff a CSV cell: empty → null, then int, float, bool, else text.
fn sniff_cell(raw: &str) -> Value {
    let unquoted = raw.trim_matches('"');
    if unquoted.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = unquoted.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = unquoted.parse::<f64>() {
        return Value::Float(f);
    }
    match unquoted {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::Str(unquoted.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn record_field_order_is_deterministic() {
        let table = Table::from_records(&[
            record(&[("gene", Value::Str("BRCA1".into())), ("expr", Value::Float(41.7))]),
            record(&[("gene", Value::Str("TP53".into())), ("expr", Value::Float(12.0))]),
        ]);
        assert_eq!(table.fields(), &["expr".to_string(), "gene".to_string()]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn missing_record_fields_become_null() {
        let table = Table::from_records(&[
            record(&[("a", Value::Int(1)), ("b", Value::Int(2))]),
            record(&[("a", Value::Int(3))]),
        ]);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn csv_header_and_type_sniffing() {
        let csv = "gene,expr,flagged\nBRCA1,41.7,true\nTP53,12,false\n";
        let table = Table::from_csv_str(csv, ',').unwrap();
        assert_eq!(table.fields(), &["gene", "expr", "flagged"]);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0][0], Value::Str("BRCA1".into()));
        assert_eq!(rows[0][1], Value::Float(41.7));
        assert_eq!(rows[0][2], Value::Bool(true));
        assert_eq!(rows[1][1], Value::Int(12));
    }

    #[test]
    fn csv_empty_cells_are_null() {
        let csv = "a,b\n1,\n,2\n";
        let table = Table::from_csv_str(csv, ',').unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0][1], Value::Null);
        assert_eq!(rows[1][0], Value::Null);
    }

    #[test]
    fn csv_without_header_errors() {
        let err = Table::from_csv_str("", ',').unwrap_err();
        assert!(matches!(err, EncodeError::Parse { .. }));
    }

    #[test]
    fn json_array_of_objects() {
        let json = r#"[{"gene": "BRCA1", "expr": 41.7}, {"gene": "TP53", "expr": 12.0}]"#;
        let table = Table::from_json_str(json).unwrap();
        assert_eq!(table.fields(), &["gene", "expr"]);
        assert_eq!(table.row_count(), 2);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0][0], Value::Str("BRCA1".into()));
    }

    #[test]
    fn json_nested_value_rejected() {
        let json = r#"[{"gene": {"id": 1}}]"#;
        assert!(Table::from_json_str(json).is_err());
    }

    #[test]
    fn fingerprint_is_content_stable() {
        let json = r#"[{"a": 1, "b": "x"}]"#;
        let t1 = Table::from_json_str(json).unwrap();
        let t2 = Table::from_json_str(json).unwrap();
        assert_eq!(t1.fingerprint(), t2.fingerprint());

        let t3 = Table::from_json_str(r#"[{"a": 2, "b": "x"}]"#).unwrap();
        assert_ne!(t1.fingerprint(), t3.fingerprint());
    }

    #[test]
    fn from_path_dispatches_on_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("data.csv");
        std::fs::write(&csv_path, "a,b\n1,2\n").unwrap();
        let table = Table::from_path(&csv_path).unwrap();
        assert_eq!(table.row_count(), 1);

        let bad_path = dir.path().join("data.parquet");
        std::fs::write(&bad_path, "x").unwrap();
        assert!(matches!(
            Table::from_path(&bad_path).unwrap_err(),
            EncodeError::UnsupportedExtension { .. }
        ));
    }
}
