use autoreg_core::PipelineConfig;
use autoreg_core::model::RegisterConfig;
use autoreg_core::pipeline::{InjectionStatus, PipelineReport};
use clap::Args;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use crate::default_cache_file;

#[derive(Args)]
pub struct RunArgs {
    /// Registration config (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,
    /// Output directory receiving copied archives and mirrored trees
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,
    /// Input archive, repeatable
    #[arg(long = "archive", value_name = "JAR")]
    pub archives: Vec<PathBuf>,
    /// Input class directory, repeatable
    #[arg(long = "dir", value_name = "DIR")]
    pub directories: Vec<PathBuf>,
    /// Cache file (defaults to autoreg-cache.json beside the output directory)
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,
    /// Also log to stderr
    #[arg(long)]
    pub stderr: bool,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
    /// Log directory (defaults to ~/.autoreg/logs)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "Archive")]
    archive: String,
    #[tabled(rename = "Cache")]
    cache: &'static str,
    #[tabled(rename = "Copied")]
    copied: &'static str,
    #[tabled(rename = "Implementers")]
    implementers: usize,
    #[tabled(rename = "Time")]
    time: String,
}

#[derive(Tabled)]
struct InjectionRow {
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Registry")]
    registry: String,
    #[tabled(rename = "Result")]
    result: String,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registrations = RegisterConfig::load(&args.config)?;
    let cache_file = args
        .cache
        .unwrap_or_else(|| default_cache_file(&args.output));
    let config = PipelineConfig {
        archives: args.archives,
        directories: args.directories,
        output_dir: args.output,
        cache_file,
    };

    let mut pipeline = autoreg_runtime::build_default_pipeline(registrations, config)?;
    let report = pipeline.run()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let archives: Vec<ArchiveRow> = report
        .archives
        .iter()
        .map(|a| ArchiveRow {
            archive: a.archive.display().to_string(),
            cache: if a.cache_hit { "hit" } else { "miss" },
            copied: if a.copied { "yes" } else { "no" },
            implementers: a.implementers,
            time: format!("{} ms", a.elapsed.as_millis()),
        })
        .collect();
    if !archives.is_empty() {
        println!("{}", Table::new(archives));
    }

    for tree in &report.trees {
        println!(
            "{}: {} units, {} implementers ({} ms)",
            tree.root.display(),
            tree.classified,
            tree.implementers,
            tree.elapsed.as_millis()
        );
    }

    let injections: Vec<InjectionRow> = report
        .injections
        .iter()
        .map(|i| InjectionRow {
            interface: i.interface_name.clone(),
            registry: i.target_class.clone(),
            result: match i.status {
                InjectionStatus::Injected { count } => format!("{count} registered"),
                InjectionStatus::NoImplementers => "no implementers".to_string(),
                InjectionStatus::MissingTarget => "registry not found".to_string(),
            },
        })
        .collect();
    if !injections.is_empty() {
        println!("{}", Table::new(injections));
    }

    println!(
        "Done in {} ms ({} of {} archives from cache)",
        report.elapsed.as_millis(),
        report.cache_hits(),
        report.archives.len()
    );
}
