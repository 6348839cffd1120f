//! Common test utilities for loader integration tests
//!
//! - [`MemoryTarget`]: an in-memory [`LoadTarget`] with a unique first column
//!   and real commit/rollback semantics, for tests that need no database
//! - [`TestPostgres`]: a PostgreSQL testcontainer (requires Docker)
//! - file helpers for writing sources into a temp dir

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use lobby_loader::{LoadError, LoadResult, LoadTarget, TargetError, TargetSchema};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

pub type Row = Vec<Option<String>>;

// ============================================================================
// In-memory target
// ============================================================================

/// Table kept in memory; the first column is a unique key
#[derive(Debug, Default)]
pub struct MemoryTarget {
    table: String,
    known_columns: Option<Vec<String>>,
    width: usize,
    committed: Vec<Row>,
    pending: Vec<Row>,
    pending_clear: bool,
    inserts: usize,
    commits: usize,
    closed: bool,
    fail_on_insert: Option<usize>,
    reject_commits: bool,
}

impl MemoryTarget {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Rows already committed before the load starts
    pub fn with_rows(mut self, rows: &[&[&str]]) -> Self {
        self.committed = rows
            .iter()
            .map(|row| row.iter().map(|v| Some(v.to_string())).collect())
            .collect();
        self
    }

    /// Restrict the header to these column names
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.known_columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Lose the connection on the n-th insert (1-based)
    pub fn fail_on_insert(mut self, n: usize) -> Self {
        self.fail_on_insert = Some(n);
        self
    }

    /// Refuse every commit with a row-level error
    pub fn reject_commits(mut self) -> Self {
        self.reject_commits = true;
        self
    }

    pub fn committed(&self) -> &[Row] {
        &self.committed
    }

    /// First column of every committed row
    pub fn committed_keys(&self) -> Vec<String> {
        self.committed
            .iter()
            .map(|row| row.first().cloned().flatten().unwrap_or_default())
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn visible_keys(&self) -> HashSet<Option<String>> {
        let committed = if self.pending_clear {
            &[][..]
        } else {
            &self.committed[..]
        };
        committed
            .iter()
            .chain(self.pending.iter())
            .map(|row| row.first().cloned().flatten())
            .collect()
    }
}

#[async_trait]
impl LoadTarget for MemoryTarget {
    fn table(&self) -> String {
        self.table.clone()
    }

    async fn prepare(&mut self, columns: &[String]) -> LoadResult<TargetSchema> {
        if let Some(known) = &self.known_columns {
            if let Some(unknown) = columns.iter().find(|c| !known.contains(c)) {
                return Err(LoadError::UnknownColumn {
                    table: self.table.clone(),
                    column: unknown.clone(),
                });
            }
        }
        self.width = columns.len();
        Ok(TargetSchema::untyped(self.table.clone(), columns))
    }

    async fn clear(&mut self) -> Result<u64, TargetError> {
        let visible = if self.pending_clear {
            0
        } else {
            self.committed.len()
        };
        let deleted = (visible + self.pending.len()) as u64;
        self.pending.clear();
        self.pending_clear = true;
        Ok(deleted)
    }

    async fn insert(&mut self, values: &[Option<&str>]) -> Result<(), TargetError> {
        self.inserts += 1;
        if self.fail_on_insert == Some(self.inserts) {
            return Err(TargetError::fatal("connection reset by peer"));
        }
        if values.len() != self.width {
            return Err(TargetError::rejected(format!(
                "row has {} values but the insert expects {} columns",
                values.len(),
                self.width
            )));
        }

        let row: Row = values.iter().map(|v| v.map(str::to_string)).collect();
        let key = row.first().cloned().flatten();
        if self.visible_keys().contains(&key) {
            return Err(TargetError::Rejected {
                message: format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    self.table
                ),
                code: Some("23505".to_string()),
                constraint: Some(format!("{}_pkey", self.table)),
            });
        }
        self.pending.push(row);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        if self.reject_commits {
            self.pending.clear();
            return Err(TargetError::rejected("could not serialize access"));
        }
        if self.pending_clear {
            self.committed.clear();
            self.pending_clear = false;
        }
        self.committed.append(&mut self.pending);
        self.commits += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        self.pending.clear();
        self.pending_clear = false;
        self.closed = true;
        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

pub fn write_source(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write source file");
    path
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read file")
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with an open pool
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    /// Pool for fixtures and assertions
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute: {}", sql))?;
        Ok(())
    }
}

/// Initialize test tracing (call once at the start of a test)
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,lobby_loader=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
