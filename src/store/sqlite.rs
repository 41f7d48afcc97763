use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{PostStore, StoredPost, Verification};
use crate::config::validate_table_name;
use crate::error::StoreError;
use crate::extract::PostRecord;

/// Native backend. Reset and all inserts share one transaction that
/// `finish` commits, so an interrupted run leaves the old rows in place.
pub struct SqliteStore {
    conn: Connection,
    table: String,
    in_tx: bool,
}

impl SqliteStore {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Self::with_connection(conn, table)
    }

    pub fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        init_schema(&conn, table)?;
        Ok(SqliteStore {
            conn,
            table: table.to_string(),
            in_tx: false,
        })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
            self.in_tx = true;
        }
        Ok(())
    }
}

pub fn init_schema(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            title    TEXT NOT NULL,
            category TEXT NOT NULL
        );
        "
    ))
    .with_context(|| format!("Failed to create table {}", table))?;
    Ok(())
}

impl PostStore for SqliteStore {
    fn reset(&mut self) -> Result<(), StoreError> {
        self.begin()?;
        self.conn
            .execute(&format!("DELETE FROM {}", self.table), [])?;

        // Only AUTOINCREMENT tables have a sequence row to clear.
        let has_sequence = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if has_sequence {
            self.conn.execute(
                "DELETE FROM sqlite_sequence WHERE name = ?1",
                params![self.table],
            )?;
        }
        debug!("Cleared {}", self.table);
        Ok(())
    }

    fn insert(&mut self, post: &PostRecord) -> Result<(), StoreError> {
        self.begin()?;
        let sql = format!(
            "INSERT INTO {} (title, category) VALUES (?1, ?2)",
            self.table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![post.title, post.category])?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn verify(&mut self, sample_size: usize) -> Result<Verification, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;

        // LIMIT is a signed 64-bit value; anything wider means "everything".
        let limit = i64::try_from(sample_size).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, category FROM {} ORDER BY id LIMIT ?1",
            self.table
        ))?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(StoredPost {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    category: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Verification::Rows { count, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, category: &str, filename: &str) -> PostRecord {
        PostRecord {
            title: title.into(),
            category: category.into(),
            filename: filename.into(),
        }
    }

    fn memory_store() -> SqliteStore {
        SqliteStore::with_connection(Connection::open_in_memory().unwrap(), "posts").unwrap()
    }

    fn typed(v: Verification) -> (i64, Vec<StoredPost>) {
        match v {
            Verification::Rows { count, rows } => (count, rows),
            Verification::Raw { .. } => panic!("expected typed rows"),
        }
    }

    #[test]
    fn insert_and_verify() {
        let mut store = memory_store();
        store.reset().unwrap();
        store.insert(&record("Hi", "Life", "a.ts")).unwrap();
        store.insert(&record("It's", "news", "b.ts")).unwrap();
        store.finish().unwrap();

        let (count, rows) = typed(store.verify(5).unwrap());
        assert_eq!(count, 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].title, "Hi");
        assert_eq!(rows[1].title, "It's");
        assert_eq!(rows[1].category, "news");
    }

    #[test]
    fn reset_restarts_ids() {
        let mut store = memory_store();
        for _ in 0..2 {
            store.reset().unwrap();
            store.insert(&record("one", "c", "1.ts")).unwrap();
            store.insert(&record("two", "c", "2.ts")).unwrap();
            store.finish().unwrap();
        }

        let (count, rows) = typed(store.verify(5).unwrap());
        assert_eq!(count, 2);
        assert_eq!(
            rows.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn sample_is_limited() {
        let mut store = memory_store();
        store.reset().unwrap();
        for i in 0..8 {
            store
                .insert(&record(&format!("post {}", i), "c", &format!("{}.ts", i)))
                .unwrap();
        }
        store.finish().unwrap();

        let (count, rows) = typed(store.verify(5).unwrap());
        assert_eq!(count, 8);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].title, "post 4");
    }

    #[test]
    fn oversized_sample_does_not_wrap() {
        let mut store = memory_store();
        store.reset().unwrap();
        for i in 0..3 {
            store
                .insert(&record(&format!("post {}", i), "c", &format!("{}.ts", i)))
                .unwrap();
        }
        store.finish().unwrap();

        let (count, rows) = typed(store.verify(usize::MAX).unwrap());
        assert_eq!(count, 3);
        assert_eq!(rows.len(), 3);

        let (_, rows) = typed(store.verify(0).unwrap());
        assert!(rows.is_empty());
    }

    #[test]
    fn rejected_row_does_not_abort_others() {
        let mut store = memory_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON posts
                 WHEN NEW.title = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        store.reset().unwrap();
        store.insert(&record("first", "c", "a.ts")).unwrap();
        let err = store.insert(&record("boom", "c", "b.ts")).unwrap_err();
        assert!(err.to_string().contains("rejected"));
        store.insert(&record("third", "c", "c.ts")).unwrap();
        store.finish().unwrap();

        let (count, rows) = typed(store.verify(5).unwrap());
        assert_eq!(count, 2);
        assert_eq!(rows[1].title, "third");
    }

    #[test]
    fn unfinished_run_keeps_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/blog.sqlite");

        let mut store = SqliteStore::open(&path, "posts").unwrap();
        store.reset().unwrap();
        store.insert(&record("kept", "c", "a.ts")).unwrap();
        store.finish().unwrap();
        drop(store);

        let mut store = SqliteStore::open(&path, "posts").unwrap();
        store.reset().unwrap();
        store.insert(&record("lost", "c", "b.ts")).unwrap();
        drop(store);

        let mut store = SqliteStore::open(&path, "posts").unwrap();
        let (count, rows) = typed(store.verify(5).unwrap());
        assert_eq!(count, 1);
        assert_eq!(rows[0].title, "kept");
    }

    #[test]
    fn invalid_table_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteStore::with_connection(conn, "posts; --").is_err());
    }
}
