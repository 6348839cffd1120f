//! CA Lobby Loader Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads CAL-ACCESS delimited exports into PostgreSQL tables row by row.
//! A row that fails (wrong width, bad bytes, rejected by a constraint) is
//! copied verbatim to an error sink and the load continues.
//!
//! # Modules
//!
//! - **loader**: the load loop ([`load`], [`load_from_reader`])
//! - **source** / **encoding**: header handling and per-field decoding
//! - **sink**: the error sink and optional reason log
//! - **target**: the [`LoadTarget`] seam, PostgreSQL and dry-run targets
//! - **db**: connection settings from the environment
//! - **cli** / **commands**: the `lobby-load` binary
//!
//! # Example
//!
//! ```no_run
//! use lobby_loader::{load, CommitGranularity, DryRunTarget, LoadOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = LoadOptions::builder("people_errors.csv")
//!         .expected_column_count(Some(2))
//!         .commit_granularity(CommitGranularity::PerRow)
//!         .build();
//!     let mut target = DryRunTarget::new("people");
//!     let outcome = load(Path::new("people.csv"), &mut target, &options).await?;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod encoding;
pub mod error;
pub mod loader;
pub mod outcome;
pub mod sink;
pub mod source;
pub mod target;

pub use config::{
    CommitGranularity, Delimiter, EncodingErrorPolicy, LoadOptions, LoadOptionsBuilder,
    SourceEncoding,
};
pub use error::{LoadError, LoadResult, TargetError};
pub use loader::{load, load_from_reader};
pub use outcome::LoadOutcome;
pub use sink::{ErrorRecord, ErrorSink};
pub use source::{SourceReader, SourceRecord, SourceRow};
pub use target::{DryRunTarget, LoadTarget, PgTarget, TableName, TargetColumn, TargetSchema};
