//! Error types for the row loader
//!
//! Two tiers: [`LoadError`] aborts a load and is returned to the caller, while
//! row-level problems never leave the loader (they become error-sink entries).
//! [`TargetError`] sits between the two: a target reports it for a single
//! statement and the loader decides which tier it belongs to.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Fatal errors that abort a load before or during processing
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open source '{path}': {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read source '{path}' after record {line}: {message}")]
    SourceRead {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Failed to open error sink '{path}': {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write error sink '{path}': {message}")]
    SinkWrite { path: PathBuf, message: String },

    #[error("Database connection failed: {0}. Check DATABASE_URL and connection settings.")]
    Connection(#[source] sqlx::Error),

    #[error("Table '{0}' does not exist or is not visible to this user")]
    TableNotFound(String),

    #[error("Header column '{column}' is not a column of table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Target failure: {0}")]
    Target(#[from] TargetError),

    #[error("Invalid load options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Config(#[from] lobby_common::LobbyError),
}

impl LoadError {
    pub(crate) fn sink_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::SinkWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Failure reported by a [`LoadTarget`](crate::target::LoadTarget) for one statement
#[derive(Error, Debug)]
pub enum TargetError {
    /// The store refused this row; the connection is still usable
    #[error("{message}")]
    Rejected {
        message: String,
        code: Option<String>,
        constraint: Option<String>,
    },

    /// The connection or transaction is no longer usable
    #[error("{0}")]
    Fatal(String),
}

impl TargetError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            code: None,
            constraint: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// SQLSTATE code, when the store supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            Self::Fatal(_) => None,
        }
    }
}

impl From<sqlx::Error> for TargetError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Rejected {
                message: db.message().to_string(),
                code: db.code().map(|c| c.into_owned()),
                constraint: db.constraint().map(str::to_string),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Fatal(err.to_string()),
            other => Self::rejected(other.to_string()),
        }
    }
}
