//! Sequential import: scan -> extract -> reset -> insert -> verify.
//!
//! Only a scan failure or a failed commit aborts the run. Unreadable files,
//! a failed reset and individual rejected rows are reported and skipped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::extract::{extract_posts, PostRecord, ReadFailure};
use crate::scanner::scan_post_files;
use crate::store::{PostStore, Verification};

#[derive(Debug, Clone, Serialize)]
pub struct InsertFailure {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub posts_dir: PathBuf,
    pub found: usize,
    pub extracted: usize,
    pub skipped: Vec<String>,
    pub read_failures: Vec<ReadFailure>,
    /// Only filled for dry runs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<PostRecord>,
    pub attempted: usize,
    pub inserted: usize,
    pub insert_failures: Vec<InsertFailure>,
    pub reset_error: Option<String>,
    pub verify_error: Option<String>,
    pub verification: Option<Verification>,
}

pub struct Importer<'a> {
    cfg: &'a ImportConfig,
    progress: ProgressBar,
    quiet: bool,
    dry_run: bool,
}

impl<'a> Importer<'a> {
    pub fn new(cfg: &'a ImportConfig) -> Self {
        Importer {
            cfg,
            progress: ProgressBar::hidden(),
            quiet: false,
            dry_run: false,
        }
    }

    /// Draw an insert progress bar on stderr.
    pub fn with_progress(mut self) -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        self.progress = pb;
        self
    }

    /// Suppress the human-readable report on stdout.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Stop after extraction and keep the records in the summary.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn say(&self, msg: impl AsRef<str>) {
        if !self.quiet {
            self.progress.suspend(|| println!("{}", msg.as_ref()));
        }
    }

    /// Run the import. `open_store` is only called when there is something
    /// to write, so an empty or fully malformed directory never touches the
    /// database.
    pub fn run<S, F>(&self, open_store: F) -> Result<ImportSummary>
    where
        S: PostStore,
        F: FnOnce() -> Result<S>,
    {
        let cfg = self.cfg;
        let dir = &cfg.posts_dir;

        let files = scan_post_files(dir, &cfg.extension)?;
        self.say(format!(
            "Found {} post files in {}.",
            files.len(),
            dir.display()
        ));

        let extraction = extract_posts(dir, &files);
        for f in &extraction.failures {
            self.say(format!("Error ({}): {}", f.filename, f.message));
        }

        let mut summary = ImportSummary {
            posts_dir: dir.clone(),
            found: files.len(),
            extracted: extraction.records.len(),
            skipped: extraction.skipped,
            read_failures: extraction.failures,
            ..Default::default()
        };

        if summary.skipped.is_empty() {
            self.say(format!("\nExtracted {} posts.", summary.extracted));
        } else {
            self.say(format!(
                "\nExtracted {} posts ({} skipped without title/category).",
                summary.extracted,
                summary.skipped.len()
            ));
        }

        let records = extraction.records;
        if records.is_empty() {
            self.say("No posts extracted; nothing to import.");
            return Ok(summary);
        }

        if self.dry_run {
            for r in &records {
                self.say(format!("  {} [{}] {}", r.filename, r.category, r.title));
            }
            summary.records = records;
            return Ok(summary);
        }

        let mut store = open_store()?;

        info!("Resetting table {}", cfg.table);
        match store.reset() {
            Ok(()) => self.say(format!("\nCleared existing rows from {}.", cfg.table)),
            Err(e) => {
                warn!("Reset of {} failed: {}", cfg.table, e);
                self.say(format!("\nReset failed: {}", e));
                summary.reset_error = Some(e.to_string());
            }
        }

        self.load(&mut store, &records, &mut summary);

        store
            .finish()
            .with_context(|| format!("Failed to commit rows into {}", cfg.table))?;
        self.say(format!(
            "\nSaved {} posts to the database.",
            summary.inserted
        ));

        match store.verify(cfg.sample_size) {
            Ok(v) => {
                self.say(format!("\n{}", v));
                summary.verification = Some(v);
            }
            Err(e) => {
                warn!("Verification query failed: {}", e);
                self.say(format!("\nVerification failed: {}", e));
                summary.verify_error = Some(e.to_string());
            }
        }

        Ok(summary)
    }

    /// One insert per record; a rejected row never stops the rest.
    fn load<S: PostStore>(&self, store: &mut S, records: &[PostRecord], summary: &mut ImportSummary) {
        self.progress.set_length(records.len() as u64);

        for record in records {
            summary.attempted += 1;
            match store.insert(record) {
                Ok(()) => summary.inserted += 1,
                Err(e) => {
                    debug!("Insert failed for {}: {}", record.filename, e);
                    self.say(format!("Failed: {} - {}", record.filename, e));
                    summary.insert_failures.push(InsertFailure {
                        filename: record.filename.clone(),
                        message: e.to_string(),
                    });
                }
            }
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        info!(
            "Inserted {}/{} rows into {}",
            summary.inserted, summary.attempted, self.cfg.table
        );
    }
}
