use std::process::Command;

use tracing::debug;

use super::{PostStore, Verification};
use crate::config::PsqlConfig;
use crate::error::StoreError;
use crate::escape::quote_literal;
use crate::extract::PostRecord;

/// Captured result of one finished client process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program to completion. Blocking, no timeout.
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput, StoreError>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput, StoreError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| StoreError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Client backend: every statement is its own
/// `<runtime> exec <container> psql -U <user> -d <db> -c <sql>` process,
/// so there is no transaction spanning reset and inserts.
pub struct PsqlStore<R = SystemRunner> {
    cfg: PsqlConfig,
    table: String,
    runner: R,
}

impl PsqlStore<SystemRunner> {
    pub fn new(cfg: PsqlConfig, table: &str) -> Self {
        Self::with_runner(cfg, table, SystemRunner)
    }
}

impl<R: CommandRunner> PsqlStore<R> {
    /// `table` must already be a validated identifier.
    pub fn with_runner(cfg: PsqlConfig, table: &str, runner: R) -> Self {
        PsqlStore {
            cfg,
            table: table.to_string(),
            runner,
        }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn args(&self, sql: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            self.cfg.container.clone(),
            self.cfg.client.clone(),
            "-U".to_string(),
            self.cfg.user.clone(),
            "-d".to_string(),
            self.cfg.database.clone(),
            "-c".to_string(),
            sql.to_string(),
        ]
    }

    fn exec(&mut self, sql: &str) -> Result<CommandOutput, StoreError> {
        debug!(runtime = %self.cfg.runtime, container = %self.cfg.container, "psql -c {}", sql);
        let args = self.args(sql);
        self.runner.run(&self.cfg.runtime, &args)
    }
}

pub fn insert_sql(table: &str, post: &PostRecord) -> String {
    format!(
        "INSERT INTO {} (title, category) VALUES ({}, {});",
        table,
        quote_literal(&post.title),
        quote_literal(&post.category)
    )
}

/// Stdout on success, otherwise everything the client printed.
fn read_back(out: CommandOutput) -> Result<String, StoreError> {
    if out.success() {
        Ok(out.stdout)
    } else {
        Err(StoreError::Client {
            status: out.status,
            output: format!("{}{}", out.stdout, out.stderr),
        })
    }
}

impl<R: CommandRunner> PostStore for PsqlStore<R> {
    fn reset(&mut self) -> Result<(), StoreError> {
        let out = self.exec(&format!("TRUNCATE TABLE {} RESTART IDENTITY;", self.table))?;
        read_back(out).map(|_| ())
    }

    fn insert(&mut self, post: &PostRecord) -> Result<(), StoreError> {
        let out = self.exec(&insert_sql(&self.table, post))?;
        if out.success() {
            Ok(())
        } else {
            Err(StoreError::Client {
                status: out.status,
                output: out.stderr,
            })
        }
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn verify(&mut self, sample_size: usize) -> Result<Verification, StoreError> {
        let count = self.exec(&format!("SELECT COUNT(*) FROM {};", self.table))?;
        let count = read_back(count)?;

        let limit = i64::try_from(sample_size).unwrap_or(i64::MAX);
        let sample = self.exec(&format!(
            "SELECT id, title, category FROM {} ORDER BY id LIMIT {};",
            self.table, limit
        ))?;
        let sample = read_back(sample)?;

        Ok(Verification::Raw { count, sample })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Replays canned outputs and records every invocation.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub calls: Vec<(String, Vec<String>)>,
        pub outputs: Vec<CommandOutput>,
    }

    impl ScriptedRunner {
        pub fn ok(stdout: &str) -> CommandOutput {
            CommandOutput {
                status: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub fn fail(stderr: &str) -> CommandOutput {
            CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }
        }

        pub fn new(outputs: Vec<CommandOutput>) -> Self {
            ScriptedRunner {
                calls: Vec::new(),
                outputs,
            }
        }

        /// Last argument of each call, which is the SQL text.
        pub fn statements(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|(_, args)| args.last().map(String::as_str))
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&mut self, program: &str, args: &[String]) -> Result<CommandOutput, StoreError> {
            self.calls.push((program.to_string(), args.to_vec()));
            if self.outputs.is_empty() {
                Ok(Self::ok(""))
            } else {
                Ok(self.outputs.remove(0))
            }
        }
    }
}
