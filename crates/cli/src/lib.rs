mod cache;
mod run;

use autoreg_core::logging::LogOptions;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub use cache::CacheCommands;
pub use run::RunArgs;

pub const DEFAULT_CACHE_NAME: &str = "autoreg-cache.json";

#[derive(Parser)]
#[command(
    name = "autoreg",
    version,
    about = "Build-time auto-registration for JVM class files",
    long_about = "Scans compiled classes and jars for implementers of configured interfaces \
                  and injects registration calls into a registry class, so nothing has to be \
                  registered by hand or discovered by reflection at runtime."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan inputs, refresh the cache and inject registrations into the output
    Run(RunArgs),
    /// Inspect or clear the archive-harvest cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
        /// Cache file
        #[arg(long, global = true, value_name = "FILE")]
        cache: PathBuf,
    },
}

/// `<output parent>/autoreg-cache.json`, beside rather than inside the output
/// area so pruning the output never touches it.
pub fn default_cache_file(output_dir: &Path) -> PathBuf {
    output_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_CACHE_NAME)
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut options = LogOptions::new("cli");
    if let Commands::Run(args) = &cli.command {
        options.to_stderr = args.stderr;
        options.verbose = args.verbose;
        options.log_dir = args.log_dir.clone();
    }
    let _guard = autoreg_runtime::init_logging(&options);

    match cli.command {
        Commands::Run(args) => run::run(args),
        Commands::Cache { command, cache } => cache::run(command, &cache),
    }
}
