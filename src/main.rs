use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use clap::{Parser, Subcommand};
use sparql_laborer::document::write_template;
use sparql_laborer::io::executor::HttpExecutor;
use sparql_laborer::run::run_file;
use sparql_laborer::{LaborerError, Result};
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Template(args) => write_template(&args.output),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(LaborerError::MissingInput(args.input));
    }
    init_logging(args.verbose, args.log_file.as_ref())?;

    let started_at = Local::now().format(TIMESTAMP_FORMAT).to_string();
    run_file(&args.input, &started_at, HttpExecutor::new()?)
}

fn init_logging(verbose: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    };
    installed.map_err(|err| LaborerError::Logging(err.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Run batches of SPARQL queries and report their results."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute every run of a query collection.
    Run(RunArgs),
    /// Write an example query collection.
    Template(TemplateArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Query collection document (JSON).
    input: PathBuf,

    /// Write the log to this file instead of standard error.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log debug output unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Where to write the template. Existing files are not overwritten.
    #[arg(long, default_value = "template.json")]
    output: PathBuf,
}
