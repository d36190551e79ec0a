//! External clingo process gateway.
//!
//! Drives the `clingo` binary over stdin/stdout. The program text is written
//! to the child's stdin; satisfiability is read from the documented exit
//! status convention (10 = satisfiable, 20 = unsatisfiable, 30 = satisfiable
//! with exhausted search) and models from the text output's `Answer:` blocks.
//! Every call runs under a wall-clock deadline: the child is polled with
//! `try_wait` and killed when the deadline passes.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{SolverError, SolverResult};
use crate::program::ConstraintProgram;

use super::{ModelStream, RawModel, SolveOptions, Solver};

/// Exit statuses that mean "at least one model exists".
const EXIT_SAT: &[i32] = &[10, 30];
/// Exit status meaning "no model exists".
const EXIT_UNSAT: i32 = 20;

/// Poll interval while waiting on the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Gateway to an external clingo binary.
#[derive(Debug, Clone)]
pub struct ClingoSolver {
    binary: String,
}

impl ClingoSolver {
    /// Use `clingo` from `$PATH`.
    pub fn new() -> ClingoSolver {
        ClingoSolver {
            binary: "clingo".into(),
        }
    }

    /// Use an explicit solver binary path.
    pub fn with_binary(binary: impl Into<String>) -> ClingoSolver {
        ClingoSolver {
            binary: binary.into(),
        }
    }

    fn spawn(&self, args: &[String], program: &ConstraintProgram) -> SolverResult<Child> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .arg("-") // read the program from stdin
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        // Hand over the program and close stdin so the solver starts grounding.
        let mut stdin = child.stdin.take().ok_or_else(|| SolverError::Io {
            message: "child stdin unavailable".into(),
        })?;
        stdin
            .write_all(program.to_source().as_bytes())
            .map_err(|e| {
                let _ = child.kill();
                let _ = child.wait();
                SolverError::Io {
                    message: format!("failed to write program to solver stdin: {e}"),
                }
            })?;
        drop(stdin);

        tracing::debug!(
            binary = %self.binary,
            lines = program.len(),
            "spawned solver process"
        );
        Ok(child)
    }
}

impl Default for ClingoSolver {
    fn default() -> Self {
        ClingoSolver::new()
    }
}

impl Solver for ClingoSolver {
    fn probe(&self, program: &ConstraintProgram, opts: &SolveOptions) -> SolverResult<bool> {
        // --quiet=2 suppresses model printing entirely; the verdict comes
        // from the exit status alone.
        let args = vec![
            "--models=1".to_string(),
            "--quiet=2".to_string(),
            "--verbose=0".to_string(),
            "--warn=none".to_string(),
        ];
        let mut child = self.spawn(&args, program)?;
        let status = wait_with_deadline(&mut child, opts.probe_timeout())?;

        let code = status.code().unwrap_or(-1);
        if EXIT_SAT.contains(&code) {
            tracing::debug!(code, "probe: satisfiable");
            Ok(true)
        } else if code == EXIT_UNSAT {
            tracing::debug!(code, "probe: unsatisfiable");
            Ok(false)
        } else {
            Err(SolverError::ProcessFailure {
                code,
                stderr: drain_stderr(&mut child),
            })
        }
    }

    fn solve(&self, program: &ConstraintProgram, opts: &SolveOptions) -> SolverResult<ModelStream> {
        let args = vec![
            format!("--models={}", opts.model_limit()),
            "--verbose=0".to_string(),
            "--warn=none".to_string(),
        ];
        let child = self.spawn(&args, program)?;
        Ok(ModelStream::from_process(ProcessStream::new(
            child,
            opts.solve_timeout(),
        )))
    }
}

// ---------------------------------------------------------------------------
// Process-backed model stream
// ---------------------------------------------------------------------------

/// Drives one solver child process and parses its answers on demand.
///
/// The child runs to completion (or deadline) on the first `next_model` call;
/// parsed answers are then served one at a time. `Drop` kills and reaps the
/// child if it is still running, so an abandoned stream never orphans the
/// external process.
pub(crate) struct ProcessStream {
    child: Option<Child>,
    deadline: Instant,
    timeout_secs: u64,
    state: StreamState,
}

enum StreamState {
    Pending,
    Serving(std::collections::VecDeque<RawModel>),
    Finished,
}

impl ProcessStream {
    fn new(child: Child, timeout: Duration) -> ProcessStream {
        ProcessStream {
            child: Some(child),
            deadline: Instant::now() + timeout,
            timeout_secs: timeout.as_secs(),
            state: StreamState::Pending,
        }
    }

    pub(crate) fn next_model(&mut self) -> Option<SolverResult<RawModel>> {
        if matches!(self.state, StreamState::Pending) {
            match self.run_to_completion() {
                Ok(models) => self.state = StreamState::Serving(models.into()),
                Err(e) => {
                    self.state = StreamState::Finished;
                    return Some(Err(e));
                }
            }
        }

        let popped = match &mut self.state {
            StreamState::Serving(models) => models.pop_front(),
            _ => return None,
        };
        match popped {
            Some(model) => Some(Ok(model)),
            None => {
                self.state = StreamState::Finished;
                None
            }
        }
    }

    /// Wait for the child under the deadline and parse its full output.
    fn run_to_completion(&mut self) -> SolverResult<Vec<RawModel>> {
        let mut child = self.child.take().ok_or_else(|| SolverError::Io {
            message: "solver process already consumed".into(),
        })?;

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let status = match wait_until(&mut child, remaining)? {
            Some(status) => status,
            None => {
                // Deadline passed: kill, reap, surface the timeout.
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(timeout_secs = self.timeout_secs, "solver call timed out");
                return Err(SolverError::Timeout {
                    seconds: self.timeout_secs,
                });
            }
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).map_err(|e| SolverError::Io {
                message: format!("failed to read solver stdout: {e}"),
            })?;
        }

        let code = status.code().unwrap_or(-1);
        if !EXIT_SAT.contains(&code) && code != EXIT_UNSAT {
            return Err(SolverError::ProcessFailure {
                code,
                stderr: drain_stderr(&mut child),
            });
        }

        let models = parse_answers(&stdout)?;
        tracing::debug!(models = models.len(), code, "solver call finished");
        Ok(models)
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!("released abandoned solver process");
        }
    }
}

// ---------------------------------------------------------------------------
// Waiting and output parsing
// ---------------------------------------------------------------------------

/// Poll `try_wait` until exit or deadline. `Ok(None)` means the deadline passed.
fn wait_until(
    child: &mut Child,
    remaining: Duration,
) -> SolverResult<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + remaining;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolverError::Io {
                    message: format!("failed to wait on solver process: {e}"),
                });
            }
        }
    }
}

/// Like `wait_until`, but maps a passed deadline to `SolverError::Timeout`.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> SolverResult<std::process::ExitStatus> {
    match wait_until(child, timeout)? {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(timeout_secs = timeout.as_secs(), "solver probe timed out");
            Err(SolverError::Timeout {
                seconds: timeout.as_secs(),
            })
        }
    }
}

fn drain_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }
    // Keep the excerpt short; the first lines carry the parse location.
    stderr.lines().take(5).collect::<Vec<_>>().join(" | ")
}

/// Parse `Answer:` blocks from clingo's text output.
///
/// Each `Answer: N` line is followed by one line of space-separated literals
/// (empty for an empty model); an `Optimization:` line attaches a score to
/// the preceding answer. Terminal verdict lines end parsing.
fn parse_answers(stdout: &str) -> SolverResult<Vec<RawModel>> {
    let mut models: Vec<RawModel> = Vec::new();
    let mut lines = stdout.lines();
    let mut saw_verdict = false;

    while let Some(line) = lines.next() {
        let line = line.trim_end();
        if line.starts_with("Answer:") {
            let atom_line = lines.next().ok_or_else(|| SolverError::MalformedOutput {
                message: "Answer header with no literal line".into(),
            })?;
            models.push(RawModel::new(split_literals(atom_line)));
        } else if let Some(rest) = line.strip_prefix("Optimization:") {
            let score = rest.split_whitespace().next().and_then(|s| s.parse().ok());
            match (models.last_mut(), score) {
                (Some(model), Some(score)) => model.score = Some(score),
                _ => {
                    return Err(SolverError::MalformedOutput {
                        message: format!("dangling optimization line: \"{line}\""),
                    });
                }
            }
        } else if line == "SATISFIABLE" || line == "UNSATISFIABLE" || line == "UNKNOWN" {
            saw_verdict = true;
        }
    }

    if !saw_verdict && !models.is_empty() {
        return Err(SolverError::MalformedOutput {
            message: "answers present but no terminal verdict line".into(),
        });
    }
    Ok(models)
}

/// Split a model line into literals on whitespace outside string literals.
fn split_literals(line: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in line.chars() {
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
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    literals.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        literals.push(current);
    }
    literals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_answer() {
        let out = "Answer: 1\ndata(41,expr,0) mark(point)\nSATISFIABLE\n";
        let models = parse_answers(out).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(
            models[0].literals,
            vec!["data(41,expr,0)".to_string(), "mark(point)".to_string()]
        );
        assert_eq!(models[0].score, None);
    }

    #[test]
    fn parses_multiple_answers_with_scores() {
        let out = "Answer: 1\nmark(bar)\nOptimization: 7\nAnswer: 2\nmark(point)\nOptimization: 3\nSATISFIABLE\n";
        let models = parse_answers(out).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].score, Some(7));
        assert_eq!(models[1].score, Some(3));
    }

    #[test]
    fn empty_model_is_valid() {
        let out = "Answer: 1\n\nSATISFIABLE\n";
        let models = parse_answers(out).unwrap();
        assert_eq!(models.len(), 1);
        assert!(models[0].literals.is_empty());
    }

    #[test]
    fn unsatisfiable_output_has_no_models() {
        let models = parse_answers("UNSATISFIABLE\n").unwrap();
        assert!(models.is_empty());
    }

    #[test]
    fn missing_verdict_is_malformed() {
        let out = "Answer: 1\nmark(point)\n";
        assert!(matches!(
            parse_answers(out).unwrap_err(),
            SolverError::MalformedOutput { .. }
        ));
    }

    #[test]
    fn literal_split_respects_quoted_spaces() {
        let literals = split_literals("data(\"breast tumor\",tissue,0) mark(point)");
        assert_eq!(
            literals,
            vec![
                "data(\"breast tumor\",tissue,0)".to_string(),
                "mark(point)".to_string()
            ]
        );
    }

    #[test]
    fn missing_binary_fails_closed() {
        let solver = ClingoSolver::with_binary("/nonexistent/clingo-binary");
        let program = ConstraintProgram::new();
        let opts = SolveOptions::default();
        assert!(matches!(
            solver.probe(&program, &opts).unwrap_err(),
            SolverError::Spawn { .. }
        ));
    }
}
