use std::path::PathBuf;

/// Fatal pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot scan posts directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid table name {0:?}: expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidTable(String),
}

/// A single database statement that did not take effect.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Non-zero exit from the database client. `output` is the captured text.
    #[error("client exited with {}: {}", exit_label(.status), .output.trim())]
    Client { status: Option<i32>, output: String },
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
