//! Tether CLI: checks library definitions and generates bridge stubs.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether", version, about = "Managed/native bridge generation")]
struct Cli {
    /// Log bridge decisions as they are made
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a library definition and summarize its index
    Check {
        /// Library definition file (.def.toml)
        definition: PathBuf,
    },
    /// Generate managed stubs for every function in a library definition
    Stubs {
        /// Library definition file (.def.toml)
        definition: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a native trampoline that calls a managed function
    Trampoline {
        /// Library definition file (.def.toml)
        definition: PathBuf,
        /// Callback prototype, e.g. "int compare(const void *a, const void *b)"
        #[arg(long)]
        prototype: String,
        /// Managed function the trampoline calls
        #[arg(long)]
        target: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check { definition } => commands::check::run(&definition),
        Commands::Stubs {
            definition,
            format,
            output,
        } => commands::stubs::run(&definition, format, output.as_deref()),
        Commands::Trampoline {
            definition,
            prototype,
            target,
        } => commands::stubs::trampoline(&definition, &prototype, &target),
    }
}
