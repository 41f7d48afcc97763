pub mod psql;
pub mod sqlite;

use std::fmt;

use serde::Serialize;

use crate::error::StoreError;
use crate::extract::PostRecord;

pub use psql::PsqlStore;
pub use sqlite::SqliteStore;

/// Destination table for post metadata. Calls arrive in the order
/// `reset`, `insert`*, `finish`, `verify`.
pub trait PostStore {
    /// Drop every row and restart the id sequence.
    fn reset(&mut self) -> Result<(), StoreError>;
    fn insert(&mut self, post: &PostRecord) -> Result<(), StoreError>;
    /// Make the inserts durable.
    fn finish(&mut self) -> Result<(), StoreError>;
    /// Row count plus the first `sample_size` rows by id.
    fn verify(&mut self, sample_size: usize) -> Result<Verification, StoreError>;
}

impl<S: PostStore + ?Sized> PostStore for &mut S {
    fn reset(&mut self) -> Result<(), StoreError> {
        (**self).reset()
    }

    fn insert(&mut self, post: &PostRecord) -> Result<(), StoreError> {
        (**self).insert(post)
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        (**self).finish()
    }

    fn verify(&mut self, sample_size: usize) -> Result<Verification, StoreError> {
        (**self).verify(sample_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPost {
    pub id: i64,
    pub title: String,
    pub category: String,
}

/// Read-back after an import, shown to the operator as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Verification {
    Rows { count: i64, rows: Vec<StoredPost> },
    /// Client stdout, unparsed.
    Raw { count: String, sample: String },
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Rows { count, rows } => {
                writeln!(f, "Rows in table: {}", count)?;
                writeln!(f, "Sample rows:")?;
                writeln!(f, "{:>4} | {:<48} | {}", "id", "title", "category")?;
                writeln!(f, "{}", "-".repeat(70))?;
                for r in rows {
                    writeln!(f, "{:>4} | {:<48} | {}", r.id, r.title, r.category)?;
                }
                Ok(())
            }
            Verification::Raw { count, sample } => {
                writeln!(f, "Database check:\n{}", count)?;
                write!(f, "Sample rows:\n{}", sample)
            }
        }
    }
}
