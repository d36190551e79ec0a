//! Rich diagnostic error types for the seshat pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the seshat pipeline.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SeshatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Solver(#[from] SolverError),
}

// ---------------------------------------------------------------------------
// Encoding errors
// ---------------------------------------------------------------------------

/// Errors from table loading, schema inference, and fact encoding.
#[derive(Debug, Error, Diagnostic)]
pub enum EncodeError {
    #[error("empty input: table has no {what}")]
    #[diagnostic(
        code(seshat::encode::empty_input),
        help(
            "Schema inference requires at least one row and one field. \
             Check that the input table or file actually contains records."
        )
    )]
    EmptyInput { what: String },

    #[error("I/O error reading \"{path}\": {source}")]
    #[diagnostic(
        code(seshat::encode::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} input: {message}")]
    #[diagnostic(
        code(seshat::encode::parse),
        help(
            "The input could not be parsed as a table. For JSON, provide an \
             array of flat objects; for CSV, a header row followed by data rows."
        )
    )]
    Parse { format: String, message: String },

    #[error("unsupported file extension: \"{path}\"")]
    #[diagnostic(
        code(seshat::encode::unsupported_extension),
        help("Supported table formats are .csv and .json.")
    )]
    UnsupportedExtension { path: String },

    #[error("unsupported value in field \"{field}\", row {row}: {message}")]
    #[diagnostic(
        code(seshat::encode::unsupported_value),
        help(
            "The cell value cannot be encoded as a ground fact. \
             Non-finite floats (NaN, infinity) have no integer truncation; \
             clean the input or drop the offending column."
        )
    )]
    UnsupportedValue {
        field: String,
        row: usize,
        message: String,
    },

    #[error("schema does not match table: {message}")]
    #[diagnostic(
        code(seshat::encode::schema_mismatch),
        help(
            "The schema was inferred from a different table. Re-run inference \
             on the table you are encoding; schemas are single-table and \
             immutable."
        )
    )]
    SchemaMismatch { message: String },

    #[error("duplicate field name after sanitization: \"{name}\"")]
    #[diagnostic(
        code(seshat::encode::duplicate_field),
        help(
            "Two column names map to the same fact-language symbol. \
             Field names must be unique once lowercased and stripped of \
             non-identifier characters — rename one of the columns."
        )
    )]
    DuplicateField { name: String },

    #[error("invalid symbol: \"{text}\"")]
    #[diagnostic(
        code(seshat::encode::invalid_symbol),
        help(
            "Fact-language symbols must match [a-z][a-z0-9_]*. \
             Use `Term::from_value` to coerce arbitrary text into a quoted literal."
        )
    )]
    InvalidSymbol { text: String },

    #[error("malformed rule: {reason}: \"{line}\"")]
    #[diagnostic(
        code(seshat::encode::malformed_rule),
        help(
            "Constraint lines must be non-empty, end with '.', have balanced \
             brackets, and contain no unterminated string literal."
        )
    )]
    MalformedRule { line: String, reason: String },
}

// ---------------------------------------------------------------------------
// Solver errors
// ---------------------------------------------------------------------------

/// Errors from the external reasoning-engine boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum SolverError {
    #[error("failed to spawn solver \"{binary}\": {source}")]
    #[diagnostic(
        code(seshat::solver::spawn),
        help(
            "The external solver could not be started. Check that the binary \
             is installed and on $PATH, or point the gateway at it explicitly \
             with `ClingoSolver::with_binary`."
        )
    )]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("solver I/O error: {message}")]
    #[diagnostic(
        code(seshat::solver::io),
        help("Reading from or writing to the solver process failed mid-call.")
    )]
    Io { message: String },

    #[error("timeout: solver exceeded {seconds}s wall-clock bound")]
    #[diagnostic(
        code(seshat::solver::timeout),
        help(
            "The call was killed at the configured deadline. Raise \
             `solve_timeout`/`probe_timeout`, lower the model limit, or \
             simplify the constraint program."
        )
    )]
    Timeout { seconds: u64 },

    #[error("solver process failed with exit code {code}: {stderr}")]
    #[diagnostic(
        code(seshat::solver::process_failure),
        help(
            "The solver exited with an unexpected status. The stderr excerpt \
             usually names the offending program line — check caller-supplied \
             rules for syntax errors."
        )
    )]
    ProcessFailure { code: i32, stderr: String },

    #[error("malformed solver output: {message}")]
    #[diagnostic(
        code(seshat::solver::malformed_output),
        help(
            "The solver's stdout did not follow the expected answer format. \
             This usually means a solver version mismatch."
        )
    )]
    MalformedOutput { message: String },

    #[error("invalid model limit: 0")]
    #[diagnostic(
        code(seshat::solver::invalid_model_limit),
        help(
            "Unbounded model enumeration is disallowed. Pass a positive bound \
             (small values, 1-5, keep search cost predictable)."
        )
    )]
    InvalidModelLimit,
}

/// Convenience alias for functions returning seshat results.
pub type SeshatResult<T> = std::result::Result<T, SeshatError>;

/// Convenience alias for the encoding subsystem.
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Convenience alias for the solver boundary.
pub type SolverResult<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_converts_to_seshat_error() {
        let err = EncodeError::EmptyInput {
            what: "rows".into(),
        };
        let top: SeshatError = err.into();
        assert!(matches!(top, SeshatError::Encode(EncodeError::EmptyInput { .. })));
    }

    #[test]
    fn solver_error_converts_to_seshat_error() {
        let err = SolverError::Timeout { seconds: 5 };
        let top: SeshatError = err.into();
        assert!(matches!(top, SeshatError::Solver(SolverError::Timeout { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = SolverError::ProcessFailure {
            code: 65,
            stderr: "parsing failed".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("65"));
        assert!(msg.contains("parsing failed"));
    }
}
