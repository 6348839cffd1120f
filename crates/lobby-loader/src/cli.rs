//! Command-line definitions for `lobby-load`

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    CommitGranularity, Delimiter, EncodingErrorPolicy, LoadOptions, LoadOptionsBuilder,
    SourceEncoding, DEFAULT_PROGRESS_INTERVAL,
};
use crate::error::LoadResult;
use crate::sink::default_error_sink_path;
use crate::target::TableName;

/// Load CAL-ACCESS delimited files into PostgreSQL, one row at a time
#[derive(Parser, Debug)]
#[command(name = "lobby-load")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the load summary as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a delimited file into an existing table
    Load(LoadArgs),

    /// Check a file's width and encoding without touching the database
    Check(SourceArgs),

    /// Show the columns of an existing table
    Describe {
        /// Table name, optionally schema-qualified
        table: String,
    },

    /// List the tables of a schema
    Tables {
        /// Schema to list
        #[arg(default_value = "public")]
        schema: String,
    },
}

/// Options shared by `load` and `check`
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Delimited input file, header row first
    pub file: PathBuf,

    /// Field delimiter (default: comma for .csv, tab otherwise)
    #[arg(short, long, value_enum)]
    pub delimiter: Option<Delimiter>,

    /// Declared text encoding of the file
    #[arg(long, value_enum, default_value_t = SourceEncoding::Utf8)]
    pub encoding: SourceEncoding,

    /// How to handle bytes that are invalid in the declared encoding
    #[arg(long = "on-decode-error", value_enum, default_value_t = EncodingErrorPolicy::Replace)]
    pub encoding_error_policy: EncodingErrorPolicy,

    /// Reject rows whose field count differs from this
    #[arg(short = 'n', long = "expected-columns")]
    pub expected_columns: Option<usize>,

    /// Column names to use instead of a header row (the file is then headerless)
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Treat double quotes as ordinary characters
    #[arg(long)]
    pub no_quoting: bool,

    /// Error sink path (default: <file stem>_errors.<ext> next to the input)
    #[arg(short, long)]
    pub errors: Option<PathBuf>,

    /// Add a timestamp to the default error sink name
    #[arg(long, conflicts_with = "errors")]
    pub timestamp_errors: bool,

    /// Also write a JSON-lines log with line number and reason per rejected row
    #[arg(long)]
    pub reason_log: Option<PathBuf>,

    /// Strip non-ASCII characters from rows written to the error sink
    #[arg(long)]
    pub ascii_errors: bool,

    /// Rows between progress log events
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: u64,
}

impl SourceArgs {
    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
            .unwrap_or_else(|| Delimiter::from_path(&self.file))
    }

    pub fn error_sink_path(&self, now: DateTime<Local>) -> PathBuf {
        match &self.errors {
            Some(path) => path.clone(),
            None => default_error_sink_path(
                &self.file,
                self.delimiter().extension(),
                self.timestamp_errors.then_some(now),
            ),
        }
    }

    /// Builder pre-filled with everything the source flags determine
    pub fn options_builder(&self, now: DateTime<Local>) -> LoadOptionsBuilder {
        LoadOptions::builder(self.error_sink_path(now))
            .delimiter(self.delimiter())
            .encoding(self.encoding)
            .encoding_error_policy(self.encoding_error_policy)
            .expected_column_count(self.expected_columns)
            .header_override(self.columns.clone())
            .quoting(!self.no_quoting)
            .reason_log_path(self.reason_log.clone())
            .sink_ascii_only(self.ascii_errors)
            .progress_interval(self.progress_interval)
    }

    /// Table name implied by the file name, e.g. `LEXP_CD.TSV` -> `lexp_cd`
    pub fn implied_table(&self) -> String {
        self.file
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Target table (default: the lower-cased file stem)
    #[arg(short, long, env = "LOBBY_TABLE")]
    pub table: Option<String>,

    /// Transaction boundaries
    #[arg(long, value_enum, default_value_t = CommitGranularity::EndOfFile)]
    pub commit: CommitGranularity,

    /// Delete existing rows from the table before loading
    #[arg(long)]
    pub replace: bool,

    /// Insert empty fields as NULL
    #[arg(long)]
    pub empty_as_null: bool,
}

impl LoadArgs {
    pub fn table_name(&self) -> LoadResult<TableName> {
        match &self.table {
            Some(table) => table.parse(),
            None => self.source.implied_table().parse(),
        }
    }

    pub fn to_options(&self, now: DateTime<Local>) -> LoadOptions {
        self.source
            .options_builder(now)
            .commit_granularity(self.commit)
            .truncate_before_load(self.replace)
            .empty_as_null(self.empty_as_null)
            .build()
    }
}
