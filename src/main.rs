mod config;
mod error;
mod escape;
mod extract;
mod pipeline;
mod scanner;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::config::{Backend, ImportConfig};
use crate::pipeline::Importer;
use crate::store::{PsqlStore, SqliteStore};

#[derive(Parser)]
#[command(
    name = "post_importer",
    about = "Replace the posts table with title/category pulled from post modules"
)]
struct Cli {
    /// Config file (default: ./post-import.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the post modules
    #[arg(short, long, value_name = "DIR")]
    posts_dir: Option<PathBuf>,

    /// File suffix that marks a post module
    #[arg(short, long)]
    extension: Option<String>,

    /// Where the rows go
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// SQLite database file (sqlite backend)
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Rows shown by the read-back query
    #[arg(short = 'n', long)]
    sample_size: Option<usize>,

    /// Extract and list posts without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut ImportConfig) {
        if let Some(dir) = &self.posts_dir {
            cfg.posts_dir = dir.clone();
        }
        if let Some(ext) = &self.extension {
            cfg.extension = ext.clone();
        }
        if let Some(backend) = self.backend {
            cfg.backend = backend;
        }
        if let Some(db) = &self.database {
            cfg.sqlite.path = db.clone();
        }
        if let Some(n) = self.sample_size {
            cfg.sample_size = n;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = ImportConfig::load(cli.config.as_deref())?;
    cli.apply(&mut cfg);
    cfg.validate()?;
    info!(settings_loaded = ?cfg, msg = "Starting post import");

    let t0 = Instant::now();
    let mut importer = Importer::new(&cfg).quiet(cli.json).dry_run(cli.dry_run);
    if !cli.json {
        importer = importer.with_progress();
    }

    let summary = match cfg.backend {
        Backend::Sqlite => importer.run(|| SqliteStore::open(&cfg.sqlite.path, &cfg.table))?,
        Backend::Psql => importer.run(|| Ok(PsqlStore::new(cfg.psql.clone(), &cfg.table)))?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    info!(
        inserted = summary.inserted,
        failed = summary.insert_failures.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Import finished"
    );
    Ok(())
}
