//! Summary of a finished load

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Counts and artefacts of one load run
///
/// Built by the loader; read-only for callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    table: String,
    source: PathBuf,
    attempted: u64,
    committed: u64,
    failed: u64,
    rows_deleted: Option<u64>,
    non_ascii_rows: u64,
    error_sink: PathBuf,
    reason_log: Option<PathBuf>,
    elapsed_ms: u64,
}

impl LoadOutcome {
    pub(crate) fn start(table: String, source: PathBuf, error_sink: PathBuf) -> Self {
        Self {
            table,
            source,
            attempted: 0,
            committed: 0,
            failed: 0,
            rows_deleted: None,
            non_ascii_rows: 0,
            error_sink,
            reason_log: None,
            elapsed_ms: 0,
        }
    }

    pub(crate) fn record_attempt(&mut self, is_ascii: bool) {
        self.attempted += 1;
        if !is_ascii {
            self.non_ascii_rows += 1;
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn record_commit(&mut self, rows: u64) {
        self.committed += rows;
    }

    pub(crate) fn set_rows_deleted(&mut self, rows: u64) {
        self.rows_deleted = Some(rows);
    }

    pub(crate) fn finish(&mut self, reason_log: Option<PathBuf>, elapsed: Duration) {
        self.reason_log = reason_log;
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Data rows read from the source, header excluded
    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Rows removed by a replace load, `None` when the table was not cleared
    pub fn rows_deleted(&self) -> Option<u64> {
        self.rows_deleted
    }

    /// Data rows containing at least one non-ASCII character after decoding
    pub fn non_ascii_rows(&self) -> u64 {
        self.non_ascii_rows
    }

    pub fn error_sink(&self) -> &Path {
        &self.error_sink
    }

    pub fn reason_log(&self) -> Option<&Path> {
        self.reason_log.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// True when no row was rejected
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} attempted, {} committed, {} failed",
            self.table, self.attempted, self.committed, self.failed
        )?;
        if let Some(deleted) = self.rows_deleted {
            write!(f, ", {} deleted beforehand", deleted)?;
        }
        if self.failed > 0 {
            write!(f, " (rejected rows in {})", self.error_sink.display())?;
        }
        Ok(())
    }
}
