//! seshat CLI: constraint-based visualization completion.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use seshat::catalog::ConstraintCatalog;
use seshat::complete::{ModelSelection, VisualizationSpec};
use seshat::pipeline::{Pipeline, PipelineConfig, PipelineResult};
use seshat::program::ConstraintProgram;
use seshat::schema::{infer_schema, SchemaConfig};
use seshat::solver::ClingoSolver;
use seshat::table::Table;

#[derive(Parser)]
#[command(name = "seshat", version, about = "Constraint-based visualization completion")]
struct Cli {
    /// External solver binary.
    #[arg(long, global = true, default_value = "clingo")]
    solver: String,

    /// Ordinal cardinality threshold for schema inference.
    #[arg(long, global = true, default_value = "20")]
    ordinal_threshold: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer and print the schema of a table file.
    Schema {
        /// Path to a .csv or .json table.
        #[arg(long)]
        file: PathBuf,
    },

    /// Encode a table file as ground facts.
    Encode {
        /// Path to a .csv or .json table.
        #[arg(long)]
        file: PathBuf,

        /// Also print the coercion log.
        #[arg(long)]
        coercions: bool,
    },

    /// Probe satisfiability of a table's facts plus constraints.
    Probe {
        /// Path to a .csv or .json table.
        #[arg(long)]
        file: PathBuf,

        /// Additional rule lines (repeatable).
        #[arg(long)]
        rule: Vec<String>,

        /// Probe timeout in seconds.
        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Skip the built-in constraint catalog.
        #[arg(long)]
        no_catalog: bool,
    },

    /// Complete a partial chart spec against a table.
    Complete {
        /// Path to a .csv or .json table.
        #[arg(long)]
        file: PathBuf,

        /// Path to the partial spec (JSON object).
        #[arg(long)]
        spec: PathBuf,

        /// Additional rule lines (repeatable).
        #[arg(long)]
        rule: Vec<String>,

        /// Maximum models to enumerate.
        #[arg(long, default_value = "1")]
        models: usize,

        /// Solve timeout in seconds.
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Pick the best-scored model instead of the first.
        #[arg(long)]
        best: bool,

        /// Skip the built-in constraint catalog.
        #[arg(long)]
        no_catalog: bool,
    },

    /// Show the constraint catalog.
    Catalog {
        /// Load the catalog from a TOML file instead of the built-in one.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let schema_config = SchemaConfig {
        ordinal_cardinality_threshold: cli.ordinal_threshold,
        ..SchemaConfig::default()
    };

    match cli.command {
        Commands::Schema { file } => {
            let table = Table::from_path(&file)?;
            let schema = infer_schema(&table, &schema_config)?;
            println!("{}", serde_json::to_string_pretty(&schema).into_diagnostic()?);
        }

        Commands::Encode { file, coercions } => {
            let table = Table::from_path(&file)?;
            let schema = infer_schema(&table, &schema_config)?;
            let facts = seshat::facts::encode_facts(&schema, &table)?;
            print!("{}", facts.to_program_text());
            if coercions {
                for coercion in facts.coercions() {
                    eprintln!("coercion: {coercion:?}");
                }
            }
        }

        Commands::Probe {
            file,
            rule,
            timeout,
            no_catalog,
        } => {
            let table = Table::from_path(&file)?;
            let config = PipelineConfig {
                probe_timeout_secs: timeout,
                ordinal_cardinality_threshold: cli.ordinal_threshold,
                catalog: if no_catalog {
                    None
                } else {
                    Some(ConstraintCatalog::builtin())
                },
                ..Default::default()
            };
            let pipeline = Pipeline::new(Arc::new(ClingoSolver::with_binary(&cli.solver)), config);
            let satisfiable = pipeline.probe(&table, &rule)?;
            println!("{}", if satisfiable { "satisfiable" } else { "unsatisfiable" });
        }

        Commands::Complete {
            file,
            spec,
            rule,
            models,
            timeout,
            best,
            no_catalog,
        } => {
            let table = Table::from_path(&file)?;
            let spec_text = std::fs::read_to_string(&spec).into_diagnostic()?;
            let partial = VisualizationSpec::from_json_str(&spec_text)
                .ok_or_else(|| miette::miette!("spec file is not a JSON object: {}", spec.display()))?;

            let config = PipelineConfig {
                model_limit: models,
                solve_timeout_secs: timeout,
                ordinal_cardinality_threshold: cli.ordinal_threshold,
                selection: if best {
                    ModelSelection::BestByScore
                } else {
                    ModelSelection::First
                },
                catalog: if no_catalog {
                    None
                } else {
                    Some(ConstraintCatalog::builtin())
                },
                ..Default::default()
            };
            let pipeline = Pipeline::new(Arc::new(ClingoSolver::with_binary(&cli.solver)), config);

            match pipeline.complete(&table, &partial, &rule) {
                PipelineResult::Completed(completed) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&completed.spec).into_diagnostic()?
                    );
                    if !completed.is_complete() {
                        eprintln!("partially completed; unset: {}", completed.unfilled.join(", "));
                    }
                }
                PipelineResult::Unsatisfiable => {
                    return Err(miette::miette!("no chart satisfies the constraints"));
                }
                PipelineResult::SolverFailed { reason } => {
                    return Err(miette::miette!("solver failed: {reason}"));
                }
                PipelineResult::EncodingFailed { reason } => {
                    return Err(miette::miette!("encoding failed: {reason}"));
                }
            }
        }

        Commands::Catalog { file } => {
            let catalog = match file {
                Some(path) => ConstraintCatalog::from_path(&path)?,
                None => ConstraintCatalog::builtin(),
            };
            let mut program = ConstraintProgram::new();
            catalog.append_to(&mut program)?;
            println!("# {} hard, {} helper, {} soft", catalog.hard.len(), catalog.helpers.len(), catalog.soft.len());
            for soft in &catalog.soft {
                println!("# soft {} (weight {})", soft.name, soft.weight);
            }
            print!("{}", program.to_source());
        }
    }

    Ok(())
}
