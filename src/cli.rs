use crate::config::Settings;
use crate::interpreter::interceptor::{combine, tracing_interceptor};
use crate::interpreter::{parser, stdlib, Context, Value};
use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "metaes")]
#[command(about = "metaes - a metacircular interpreter for a JavaScript subset", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a script file and print its completion value
    Run {
        /// Script to evaluate
        file: PathBuf,

        /// Log every evaluation event at TRACE level
        #[arg(long)]
        trace: bool,
    },

    /// Evaluate a script given on the command line
    Eval {
        /// Script source
        source: String,
    },

    /// Parse a script file and print its ESTree JSON
    Parse {
        /// Script to parse
        file: PathBuf,

        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },
}

impl Cli {
    /// Loads settings, honouring `--config`
    pub fn settings(&self) -> Result<Settings> {
        let builder = Settings::builder();
        let builder = match &self.config {
            Some(path) => builder.config_path(path),
            None => builder,
        };
        builder.build().context("Failed to load settings")
    }

    /// Default log filter for this invocation
    pub fn log_filter(&self, settings: &Settings) -> String {
        match self.command {
            Commands::Run { trace: true, .. } => format!("{},metaes_core=trace", settings.logging.filter),
            _ => settings.logging.filter.clone(),
        }
    }
}

/// Executes the parsed command
pub async fn run_cli_with_args(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Run { file, trace } => {
            let source = read_source(&file)?;
            let value = evaluate(&settings, source, trace).await?;
            println!("{}", value);
        }

        Commands::Eval { source } => {
            let value = evaluate(&settings, source, false).await?;
            println!("{}", value);
        }

        Commands::Parse { file, compact } => {
            let source = read_source(&file)?;
            let program = parser::parse(&source)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            let json = if compact {
                serde_json::to_string(&program)?
            } else {
                serde_json::to_string_pretty(&program)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    run_cli_with_args(cli, settings).await
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

async fn evaluate(settings: &Settings, source: String, trace: bool) -> Result<Value> {
    let mut config = settings.evaluation_config();
    if trace {
        config.interceptor = Some(match config.interceptor.take() {
            Some(budget) => combine(vec![budget, tracing_interceptor()]),
            None => tracing_interceptor(),
        });
    }

    let context = Context::new(stdlib::global_environment(), config);
    let context = if settings.evaluation.cache_parses {
        context.with_parse_cache()
    } else {
        context
    };

    let local = tokio::task::LocalSet::new();
    let result = local
        .run_until(async { context.evaluate_async(source, None).await })
        .await;
    info!(ok = result.is_ok(), "evaluation finished");
    result.map_err(|exception| anyhow!("{}", exception))
}
