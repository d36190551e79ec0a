//! Pipeline orchestration: table to completed spec through the solver.
//!
//! Sequences the stages `Draft → Encoded → Probed → {Unsatisfiable |
//! Solving} → terminal` and collapses every outcome into exactly one
//! [`PipelineResult`] variant. Encoding and solver errors become tagged
//! results at this boundary — callers branch on the tag, they never catch
//! a crash. An unsatisfiable probe returns immediately: `solve` is only
//! reachable through a passed probe.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::catalog::ConstraintCatalog;
use crate::complete::{complete_spec, CompletedSpec, ModelSelection, VisualizationSpec};
use crate::decode::{decode_model, AnswerSet};
use crate::error::{EncodeError, EncodeResult, SeshatResult};
use crate::facts::{encode_facts, FactSet};
use crate::program::ConstraintProgram;
use crate::schema::{infer_schema, Schema, SchemaConfig};
use crate::solver::{SolveOptions, Solver};
use crate::table::Table;

// ---------------------------------------------------------------------------
// Results and configuration
// ---------------------------------------------------------------------------

/// The single tagged outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PipelineResult {
    /// The spec was completed (possibly partially; check `unfilled`).
    Completed(CompletedSpec),
    /// The program has no model. A valid terminal, not an error.
    Unsatisfiable,
    /// The external solver crashed, timed out, or produced garbage.
    SolverFailed { reason: String },
    /// The input table could not be profiled or encoded.
    EncodingFailed { reason: String },
}

impl PipelineResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineResult::Completed(_))
    }
}

/// What to do when a satisfiable program returns zero models.
#[derive(Clone)]
pub enum FallbackPolicy {
    /// Return the partial spec unchanged, flagged with its unfilled fields.
    Identity,
    /// Treat zero models as a solver failure.
    Error,
    /// Caller-supplied completion.
    Custom(Arc<dyn Fn(&VisualizationSpec) -> CompletedSpec + Send + Sync>),
}

impl std::fmt::Debug for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::Identity => write!(f, "Identity"),
            FallbackPolicy::Error => write!(f, "Error"),
            FallbackPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Configuration for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum models to enumerate per solve (default: 1).
    pub model_limit: usize,
    /// Wall-clock bound per solve call in seconds (default: 30).
    pub solve_timeout_secs: u64,
    /// Wall-clock bound per probe call in seconds (default: 10).
    pub probe_timeout_secs: u64,
    /// Schema inference threshold for ordinal fields (default: 20).
    pub ordinal_cardinality_threshold: usize,
    /// Zero-model fallback policy (default: identity).
    pub fallback: FallbackPolicy,
    /// Which model to complete against (default: first).
    pub selection: ModelSelection,
    /// Constraint catalog spliced into every program; `None` disables it.
    pub catalog: Option<ConstraintCatalog>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_limit: 1,
            solve_timeout_secs: 30,
            probe_timeout_secs: 10,
            ordinal_cardinality_threshold: 20,
            fallback: FallbackPolicy::Identity,
            selection: ModelSelection::First,
            catalog: Some(ConstraintCatalog::builtin()),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The pipeline orchestrator. Owns one solver session per instance; create
/// one instance per concurrent invocation rather than sharing.
///
/// The schema/fact cache is keyed by table content fingerprint. It is a
/// purely additive optimization: every entry can be recomputed from the
/// table at any time.
pub struct Pipeline {
    config: PipelineConfig,
    solver: Arc<dyn Solver>,
    cache: DashMap<u64, Arc<(Schema, FactSet)>>,
}

impl Pipeline {
    pub fn new(solver: Arc<dyn Solver>, config: PipelineConfig) -> Pipeline {
        tracing::debug!(
            model_limit = config.model_limit,
            solve_timeout_secs = config.solve_timeout_secs,
            "initializing pipeline"
        );
        Pipeline {
            config,
            solver,
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Infer the schema and encode the facts for a table, memoized by
    /// content fingerprint.
    pub fn encode(&self, table: &Table) -> EncodeResult<Arc<(Schema, FactSet)>> {
        let key = table.fingerprint();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key, "schema/fact cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let schema_config = SchemaConfig {
            ordinal_cardinality_threshold: self.config.ordinal_cardinality_threshold,
            ..SchemaConfig::default()
        };
        let schema = infer_schema(table, &schema_config)?;
        let facts = encode_facts(&schema, table)?;
        let entry = Arc::new((schema, facts));
        self.cache.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Assemble the full program: encoded facts, then the catalog, then
    /// caller rules, in that order.
    fn build_program(&self, facts: &FactSet, rules: &[String]) -> EncodeResult<ConstraintProgram> {
        let mut program = ConstraintProgram::from_facts(facts);
        if let Some(catalog) = &self.config.catalog {
            catalog.append_to(&mut program)?;
        }
        program.push_rules(rules.iter().cloned())?;
        Ok(program)
    }

    fn solve_options(&self) -> crate::error::SolverResult<SolveOptions> {
        Ok(SolveOptions::new(self.config.model_limit)?
            .with_solve_timeout(std::time::Duration::from_secs(self.config.solve_timeout_secs))
            .with_probe_timeout(std::time::Duration::from_secs(self.config.probe_timeout_secs)))
    }

    /// Satisfiability of a table's facts plus caller rules.
    pub fn probe(&self, table: &Table, rules: &[String]) -> SeshatResult<bool> {
        let encoded = self.encode(table)?;
        let program = self.build_program(&encoded.1, rules)?;
        let opts = self.solve_options()?;
        Ok(self.solver.probe(&program, &opts)?)
    }

    /// Run the full pipeline: encode, probe, solve, decode, complete.
    ///
    /// Always returns exactly one result variant; nothing here panics on
    /// bad input or a misbehaving solver.
    pub fn complete(
        &self,
        table: &Table,
        partial: &VisualizationSpec,
        rules: &[String],
    ) -> PipelineResult {
        // Draft → Encoded
        let encoded = match self.encode(table) {
            Ok(encoded) => encoded,
            Err(e) => return encoding_failed(e),
        };
        let program = match self.build_program(&encoded.1, rules) {
            Ok(program) => program,
            Err(e) => return encoding_failed(e),
        };
        tracing::debug!(lines = program.len(), "stage: encoded");

        // Encoded → Probed
        let opts = match self.solve_options() {
            Ok(opts) => opts,
            Err(e) => {
                return PipelineResult::SolverFailed {
                    reason: e.to_string(),
                };
            }
        };
        let satisfiable = match self.solver.probe(&program, &opts) {
            Ok(satisfiable) => satisfiable,
            Err(e) => {
                tracing::warn!(error = %e, "probe failed");
                return PipelineResult::SolverFailed {
                    reason: e.to_string(),
                };
            }
        };
        if !satisfiable {
            tracing::debug!("stage: probed, unsatisfiable");
            return PipelineResult::Unsatisfiable;
        }
        tracing::debug!("stage: probed, satisfiable");

        // Probed → Solving
        let stream = match self.solver.solve(&program, &opts) {
            Ok(stream) => stream,
            Err(e) => {
                return PipelineResult::SolverFailed {
                    reason: e.to_string(),
                };
            }
        };
        let mut answers: Vec<AnswerSet> = Vec::new();
        for item in stream {
            match item {
                Ok(model) => answers.push(decode_model(&model)),
                Err(e) => {
                    tracing::warn!(error = %e, "model enumeration failed");
                    return PipelineResult::SolverFailed {
                        reason: e.to_string(),
                    };
                }
            }
        }
        tracing::debug!(models = answers.len(), "stage: solving finished");

        // Solving → terminal
        if answers.is_empty() {
            return self.fall_back(partial);
        }
        PipelineResult::Completed(complete_spec(partial, &answers, self.config.selection))
    }

    /// Zero models from a satisfiable program: apply the configured
    /// fallback, surfacing which path was taken.
    fn fall_back(&self, partial: &VisualizationSpec) -> PipelineResult {
        match &self.config.fallback {
            FallbackPolicy::Identity => {
                tracing::warn!("zero models returned; falling back to the partial spec");
                PipelineResult::Completed(complete_spec(partial, &[], self.config.selection))
            }
            FallbackPolicy::Error => PipelineResult::SolverFailed {
                reason: "no models returned".into(),
            },
            FallbackPolicy::Custom(callback) => {
                tracing::warn!("zero models returned; applying custom fallback");
                PipelineResult::Completed(callback(partial))
            }
        }
    }
}

fn encoding_failed(e: EncodeError) -> PipelineResult {
    tracing::warn!(error = %e, "encoding failed");
    PipelineResult::EncodingFailed {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SolverError, SolverResult};
    use crate::solver::{ModelStream, RawModel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-process stand-in for the external reasoner.
    struct StubSolver {
        satisfiable: bool,
        models: Vec<RawModel>,
        fail_probe: bool,
        solve_calls: Arc<AtomicUsize>,
    }

    impl StubSolver {
        fn satisfiable(models: Vec<RawModel>) -> StubSolver {
            StubSolver {
                satisfiable: true,
                models,
                fail_probe: false,
                solve_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn unsatisfiable() -> StubSolver {
            StubSolver {
                satisfiable: false,
                models: vec![],
                fail_probe: false,
                solve_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Solver for StubSolver {
        fn probe(&self, _program: &ConstraintProgram, _opts: &SolveOptions) -> SolverResult<bool> {
            if self.fail_probe {
                return Err(SolverError::Timeout { seconds: 1 });
            }
            Ok(self.satisfiable)
        }

        fn solve(
            &self,
            _program: &ConstraintProgram,
            opts: &SolveOptions,
        ) -> SolverResult<ModelStream> {
            self.solve_calls.fetch_add(1, Ordering::SeqCst);
            let bounded: Vec<RawModel> = self
                .models
                .iter()
                .take(opts.model_limit())
                .cloned()
                .collect();
            Ok(ModelStream::from_models(bounded))
        }
    }

    fn gene_table() -> Table {
        Table::from_json_str(r#"[{"gene": "BRCA1", "expr": 41.7}, {"gene": "TP53", "expr": 12.0}]"#)
            .unwrap()
    }

    fn point_model() -> RawModel {
        RawModel::new(vec![
            "mark(point)".into(),
            "channel(e0,x)".into(),
            "field(e0,gene)".into(),
            "type(e0,nominal)".into(),
        ])
    }

    fn pipeline(solver: StubSolver) -> Pipeline {
        Pipeline::new(Arc::new(solver), PipelineConfig::default())
    }

    #[test]
    fn completes_against_stub_model() {
        let p = pipeline(StubSolver::satisfiable(vec![point_model()]));
        let partial = VisualizationSpec::from_json_str(r#"{"mark": "point"}"#).unwrap();

        let result = p.complete(&gene_table(), &partial, &[]);
        let PipelineResult::Completed(completed) = result else {
            panic!("expected completion, got {result:?}");
        };
        assert_eq!(
            completed.spec.get_path("encoding.x.field").unwrap(),
            "gene"
        );
    }

    #[test]
    fn unsatisfiable_probe_skips_solve() {
        let stub = StubSolver::unsatisfiable();
        let calls = Arc::clone(&stub.solve_calls);
        let p = Pipeline::new(Arc::new(stub), PipelineConfig::default());

        let result = p.complete(&gene_table(), &VisualizationSpec::new(), &[]);
        assert_eq!(result, PipelineResult::Unsatisfiable);
        // The gate is structural: solve was never invoked.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn probe_failure_is_solver_failed() {
        let stub = StubSolver {
            satisfiable: true,
            models: vec![],
            fail_probe: true,
            solve_calls: Arc::new(AtomicUsize::new(0)),
        };
        let p = pipeline(stub);
        let result = p.complete(&gene_table(), &VisualizationSpec::new(), &[]);
        assert!(matches!(result, PipelineResult::SolverFailed { .. }));
    }

    #[test]
    fn empty_table_is_encoding_failed() {
        let p = pipeline(StubSolver::satisfiable(vec![]));
        let empty = Table::from_json_str("[]").unwrap();
        let result = p.complete(&empty, &VisualizationSpec::new(), &[]);
        assert!(matches!(result, PipelineResult::EncodingFailed { .. }));
    }

    #[test]
    fn zero_models_identity_fallback() {
        let p = pipeline(StubSolver::satisfiable(vec![]));
        let partial = VisualizationSpec::from_json_str(r#"{"mark": "point"}"#).unwrap();
        let result = p.complete(&gene_table(), &partial, &[]);
        let PipelineResult::Completed(completed) = result else {
            panic!("identity fallback should complete");
        };
        assert_eq!(completed.spec, partial);
    }

    #[test]
    fn zero_models_error_fallback() {
        let config = PipelineConfig {
            fallback: FallbackPolicy::Error,
            ..Default::default()
        };
        let p = Pipeline::new(Arc::new(StubSolver::satisfiable(vec![])), config);
        let result = p.complete(&gene_table(), &VisualizationSpec::new(), &[]);
        assert!(matches!(result, PipelineResult::SolverFailed { .. }));
    }

    #[test]
    fn zero_models_custom_fallback() {
        let config = PipelineConfig {
            fallback: FallbackPolicy::Custom(Arc::new(|partial| CompletedSpec {
                spec: partial.clone(),
                unfilled: vec!["custom".into()],
            })),
            ..Default::default()
        };
        let p = Pipeline::new(Arc::new(StubSolver::satisfiable(vec![])), config);
        let result = p.complete(&gene_table(), &VisualizationSpec::new(), &[]);
        let PipelineResult::Completed(completed) = result else {
            panic!("custom fallback should complete");
        };
        assert_eq!(completed.unfilled, vec!["custom".to_string()]);
    }

    #[test]
    fn malformed_caller_rule_is_encoding_failed() {
        let p = pipeline(StubSolver::satisfiable(vec![point_model()]));
        let result = p.complete(
            &gene_table(),
            &VisualizationSpec::new(),
            &["busted rule without terminator".into()],
        );
        assert!(matches!(result, PipelineResult::EncodingFailed { .. }));
    }

    #[test]
    fn encode_cache_returns_identical_entry() {
        let p = pipeline(StubSolver::satisfiable(vec![]));
        let table = gene_table();
        let a = p.encode(&table).unwrap();
        let b = p.encode(&table).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
