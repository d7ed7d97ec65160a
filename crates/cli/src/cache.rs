use autoreg_core::cache::CacheStore;
use clap::Subcommand;
use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache statistics
    Stats,
    /// List cached archives
    List {
        /// Sort by size or implementer count
        #[arg(long, value_parser = ["size", "implementers"])]
        sort: Option<String>,
        /// Filter by path substring
        #[arg(long)]
        filter: Option<String>,
    },
    /// Delete the cache file
    Clear,
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Implementers")]
    implementers: usize,
    #[tabled(rename = "Registry")]
    registry: &'static str,
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    }
}

pub fn run(cmd: CacheCommands, cache_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = CacheStore::new(cache_file.to_path_buf());

    match cmd {
        CacheCommands::Stats => {
            let stats = store.stats();
            println!("Cache File:         {}", stats.cache_file.display());
            println!("File Size:          {}", human_size(stats.size_bytes));
            println!("Cached Archives:    {}", stats.total_archives);
            println!("Implementers:       {}", stats.total_implementers);
            println!("Registry Archives:  {}", stats.registry_archives);
        }
        CacheCommands::List { sort, filter } => {
            let mut archives = store.summaries();
            if let Some(pattern) = filter {
                archives.retain(|a| a.path.contains(&pattern));
            }
            match sort.as_deref() {
                Some("size") => archives.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
                Some("implementers") => {
                    archives.sort_by(|a, b| b.implementers.cmp(&a.implementers))
                }
                _ => {}
            }

            let rows: Vec<ArchiveRow> = archives
                .into_iter()
                .map(|a| ArchiveRow {
                    fingerprint: a.fingerprint,
                    path: a.path,
                    size: human_size(a.size_bytes),
                    implementers: a.implementers,
                    registry: if a.contains_registry_target { "yes" } else { "" },
                })
                .collect();

            if rows.is_empty() {
                println!("No cached archives found.");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        CacheCommands::Clear => {
            store.clear()?;
            println!("Cache cleared successfully.");
        }
    }

    Ok(())
}
