use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Looked up in the working directory when `--config` isn't given.
pub const DEFAULT_CONFIG_FILE: &str = "post-import";
pub const ENV_PREFIX: &str = "POST_IMPORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Native SQLite connection, one transaction per run.
    Sqlite,
    /// `psql` inside a container, one client process per statement.
    Psql,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    pub posts_dir: PathBuf,
    pub extension: String,
    pub table: String,
    /// Rows shown by the read-back query.
    pub sample_size: usize,
    pub backend: Backend,
    pub sqlite: SqliteConfig,
    pub psql: PsqlConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PsqlConfig {
    /// Container runtime binary (`podman`, `docker`, or an absolute path).
    pub runtime: String,
    pub container: String,
    pub client: String,
    pub user: String,
    pub database: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            posts_dir: PathBuf::from("posts"),
            extension: ".ts".to_string(),
            table: "posts".to_string(),
            sample_size: 5,
            backend: Backend::Sqlite,
            sqlite: SqliteConfig::default(),
            psql: PsqlConfig::default(),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: PathBuf::from("data/blog.sqlite"),
        }
    }
}

impl Default for PsqlConfig {
    fn default() -> Self {
        PsqlConfig {
            runtime: "podman".to_string(),
            container: "blog-postgres".to_string(),
            client: "psql".to_string(),
            user: "blog".to_string(),
            database: "blog".to_string(),
        }
    }
}

impl ImportConfig {
    /// Defaults, then the config file, then `POST_IMPORT_*` variables.
    ///
    /// An explicit `file` must exist; the default `post-import.*` is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file_source = match file {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let cfg: ImportConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table)?;
        anyhow::ensure!(!self.extension.is_empty(), "extension must not be empty");
        anyhow::ensure!(
            i64::try_from(self.sample_size).is_ok(),
            "sample_size {} is out of range",
            self.sample_size
        );
        Ok(())
    }
}

/// The table name is spliced into SQL text, so it must be a plain identifier.
pub fn validate_table_name(name: &str) -> Result<(), ImportError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ImportError::InvalidTable(name.to_string()))
    }
}
