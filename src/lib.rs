//! # seshat
//!
//! Constraint-based visualization completion: heterogeneous tabular data is
//! profiled into a typed schema, encoded as ground ASP facts, solved against
//! a constraint knowledge base by an external reasoner, and the chosen
//! attributes are merged back into a partial chart specification.
//!
//! ## Architecture
//!
//! - **Tables** (`table`): typed cell values, CSV/JSON loading
//! - **Schema inference** (`schema`): nominal/ordinal/quantitative/temporal
//! - **Fact encoding** (`facts`): `data/3` and `fieldtype/2` ground facts
//!   with a logged coercion trail
//! - **Programs** (`program`): validated fact/rule sequences
//! - **Solver gateway** (`solver`): probe + bounded enumeration over an
//!   external clingo process, behind a capability trait
//! - **Decoding** (`decode`): raw models into predicate → tuples mappings
//! - **Completion** (`complete`): merge solver choices under a partial spec
//! - **Pipeline** (`pipeline`): the orchestrated end-to-end state machine
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use seshat::complete::VisualizationSpec;
//! use seshat::pipeline::{Pipeline, PipelineConfig, PipelineResult};
//! use seshat::solver::ClingoSolver;
//! use seshat::table::Table;
//!
//! let table = Table::from_json_str(
//!     r#"[{"gene": "BRCA1", "expr": 41.7}, {"gene": "TP53", "expr": 12.0}]"#,
//! ).unwrap();
//! let partial = VisualizationSpec::from_json_str(r#"{"mark": "point"}"#).unwrap();
//!
//! let pipeline = Pipeline::new(Arc::new(ClingoSolver::new()), PipelineConfig::default());
//! match pipeline.complete(&table, &partial, &[]) {
//!     PipelineResult::Completed(spec) => println!("{:?}", spec),
//!     PipelineResult::Unsatisfiable => eprintln!("no chart satisfies the constraints"),
//!     PipelineResult::SolverFailed { reason } => eprintln!("solver failed: {reason}"),
//!     PipelineResult::EncodingFailed { reason } => eprintln!("bad input: {reason}"),
//! }
//! ```

pub mod catalog;
pub mod complete;
pub mod decode;
pub mod error;
pub mod facts;
pub mod pipeline;
pub mod program;
pub mod schema;
pub mod solver;
pub mod table;
