//! Solver gateway: the capability boundary to the external reasoning engine.
//!
//! The engine is a black box that accepts a ground logic program and returns
//! either "unsatisfiable", a bounded sequence of models, or a process-level
//! failure. Everything process-specific lives behind the [`Solver`] trait so
//! the pipeline (and its tests) never touch the external binary directly.
//!
//! Two operations, by contract:
//! - [`Solver::probe`]: cheap existence check, no model materialization.
//!   Fails closed — any external error is a [`SolverError`], never a crash.
//! - [`Solver::solve`]: bounded enumeration as a lazy [`ModelStream`].
//!   Dropping the stream early releases the underlying process.

mod clingo;

pub use clingo::ClingoSolver;

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{SolverError, SolverResult};
use crate::program::ConstraintProgram;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-call solver options. The model limit is validated at construction:
/// unbounded enumeration is disallowed, so a zero limit is rejected where the
/// options are made rather than where they are consumed.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    model_limit: usize,
    solve_timeout: Duration,
    probe_timeout: Duration,
}

impl SolveOptions {
    /// Build options with the given model bound (must be ≥ 1).
    pub fn new(model_limit: usize) -> SolverResult<SolveOptions> {
        if model_limit == 0 {
            return Err(SolverError::InvalidModelLimit);
        }
        Ok(SolveOptions {
            model_limit,
            ..SolveOptions::default()
        })
    }

    pub fn with_solve_timeout(mut self, timeout: Duration) -> SolveOptions {
        self.solve_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> SolveOptions {
        self.probe_timeout = timeout;
        self
    }

    pub fn model_limit(&self) -> usize {
        self.model_limit
    }

    pub fn solve_timeout(&self) -> Duration {
        self.solve_timeout
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            model_limit: 1,
            solve_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// One raw model from the solver: an unordered set of ground literals, plus
/// the optimization score when the program carries soft constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModel {
    pub literals: Vec<String>,
    pub score: Option<i64>,
}

impl RawModel {
    pub fn new(literals: Vec<String>) -> RawModel {
        RawModel {
            literals,
            score: None,
        }
    }

    pub fn with_score(mut self, score: i64) -> RawModel {
        self.score = Some(score);
        self
    }
}

/// A lazy, finite sequence of models from one solve call.
///
/// Process-backed streams own the external process handle; dropping the
/// stream before exhaustion kills and reaps it, so abandoning a partial
/// enumeration never leaks a solver process.
pub struct ModelStream {
    inner: StreamInner,
}

enum StreamInner {
    /// Pre-computed models (stub solvers, tests).
    Ready(VecDeque<RawModel>),
    /// Live external process, driven on demand.
    Process(Box<clingo::ProcessStream>),
}

impl ModelStream {
    /// Wrap an already-materialized model list.
    pub fn from_models(models: Vec<RawModel>) -> ModelStream {
        ModelStream {
            inner: StreamInner::Ready(models.into()),
        }
    }

    pub(crate) fn from_process(process: clingo::ProcessStream) -> ModelStream {
        ModelStream {
            inner: StreamInner::Process(Box::new(process)),
        }
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub fn collect_models(self) -> SolverResult<Vec<RawModel>> {
        let mut models = Vec::new();
        for item in self {
            models.push(item?);
        }
        Ok(models)
    }
}

impl Iterator for ModelStream {
    type Item = SolverResult<RawModel>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            StreamInner::Ready(models) => models.pop_front().map(Ok),
            StreamInner::Process(process) => process.next_model(),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// Capability interface to the reasoning engine: satisfiability probe and
/// bounded model enumeration. One session per pipeline invocation; sessions
/// must not be shared across concurrent callers.
pub trait Solver: Send + Sync {
    /// Does at least one model exist? Must not materialize models.
    fn probe(&self, program: &ConstraintProgram, opts: &SolveOptions) -> SolverResult<bool>;

    /// Enumerate up to `opts.model_limit()` models.
    fn solve(&self, program: &ConstraintProgram, opts: &SolveOptions) -> SolverResult<ModelStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_model_limit_rejected() {
        assert!(matches!(
            SolveOptions::new(0).unwrap_err(),
            SolverError::InvalidModelLimit
        ));
    }

    #[test]
    fn options_default_to_single_model() {
        let opts = SolveOptions::default();
        assert_eq!(opts.model_limit(), 1);
    }

    #[test]
    fn ready_stream_yields_in_order() {
        let stream = ModelStream::from_models(vec![
            RawModel::new(vec!["a".into()]),
            RawModel::new(vec!["b".into()]).with_score(3),
        ]);
        let models = stream.collect_models().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].literals, vec!["a".to_string()]);
        assert_eq!(models[1].score, Some(3));
    }
}
