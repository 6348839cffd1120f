//! Load options
//!
//! Everything that used to be a copy-pasted constant at the top of each
//! upload script (table, column count, encoding policy, error file) is a field
//! of [`LoadOptions`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};

/// Default number of rows between progress events.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Field delimiter of the source file (and of the error sink)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }

    /// File extension conventionally used for this delimiter
    pub fn extension(self) -> &'static str {
        match self {
            Delimiter::Tab => "tsv",
            Delimiter::Comma => "csv",
        }
    }

    /// Guess from a file extension; `.csv` is comma, anything else is tab
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Delimiter::Comma,
            _ => Delimiter::Tab,
        }
    }
}

/// Declared text encoding of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceEncoding {
    #[default]
    #[value(name = "utf-8", alias = "utf8")]
    #[serde(rename = "utf-8")]
    Utf8,
    Ascii,
}

impl std::fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceEncoding::Utf8 => f.write_str("utf-8"),
            SourceEncoding::Ascii => f.write_str("ascii"),
        }
    }
}

/// What to do with bytes that are not valid in the declared encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodingErrorPolicy {
    /// Substitute U+FFFD and keep the row
    #[default]
    Replace,
    /// Reject the row
    Strict,
    /// Drop the offending bytes and keep the row
    Ignore,
}

/// Where transaction boundaries are drawn during a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CommitGranularity {
    /// Commit after every successful insert
    PerRow,
    /// One commit after the last line
    #[default]
    EndOfFile,
}

/// Configuration of a single load run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    pub delimiter: Delimiter,
    pub encoding: SourceEncoding,
    pub encoding_error_policy: EncodingErrorPolicy,
    /// Rows with a different field count are rejected before insertion
    pub expected_column_count: Option<usize>,
    pub commit_granularity: CommitGranularity,
    /// Rejected rows are written here; the file is created or truncated
    pub error_sink_path: PathBuf,
    /// Optional JSON-lines file with line number and reason per rejected row
    pub reason_log_path: Option<PathBuf>,
    /// Delete existing rows from the target before loading
    pub truncate_before_load: bool,
    /// Honour double-quote escaping; disable for files with stray quotes
    pub quoting: bool,
    /// Column names to use instead of a header row; the first line is then data
    pub header_override: Option<Vec<String>>,
    /// Bind empty fields as NULL instead of ''
    pub empty_as_null: bool,
    /// Strip non-ASCII characters from fields written to the error sink
    pub sink_ascii_only: bool,
    pub progress_interval: u64,
}

impl LoadOptions {
    /// Start a builder; the error sink path is the only required setting
    pub fn builder(error_sink_path: impl Into<PathBuf>) -> LoadOptionsBuilder {
        LoadOptionsBuilder {
            options: LoadOptions {
                delimiter: Delimiter::default(),
                encoding: SourceEncoding::default(),
                encoding_error_policy: EncodingErrorPolicy::default(),
                expected_column_count: None,
                commit_granularity: CommitGranularity::default(),
                error_sink_path: error_sink_path.into(),
                reason_log_path: None,
                truncate_before_load: false,
                quoting: true,
                header_override: None,
                empty_as_null: false,
                sink_ascii_only: false,
                progress_interval: DEFAULT_PROGRESS_INTERVAL,
            },
        }
    }

    /// Validate option combinations
    pub fn validate(&self) -> LoadResult<()> {
        if self.expected_column_count == Some(0) {
            return Err(LoadError::InvalidOptions(
                "expected_column_count must be greater than 0".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(LoadError::InvalidOptions(
                "progress_interval must be greater than 0".to_string(),
            ));
        }
        if self.error_sink_path.as_os_str().is_empty() {
            return Err(LoadError::InvalidOptions(
                "error_sink_path cannot be empty".to_string(),
            ));
        }
        if self.reason_log_path.as_deref() == Some(self.error_sink_path.as_path()) {
            return Err(LoadError::InvalidOptions(
                "reason log and error sink must be different files".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for LoadOptions
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn encoding(mut self, encoding: SourceEncoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    pub fn encoding_error_policy(mut self, policy: EncodingErrorPolicy) -> Self {
        self.options.encoding_error_policy = policy;
        self
    }

    pub fn expected_column_count(mut self, count: Option<usize>) -> Self {
        self.options.expected_column_count = count;
        self
    }

    pub fn commit_granularity(mut self, granularity: CommitGranularity) -> Self {
        self.options.commit_granularity = granularity;
        self
    }

    pub fn reason_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.options.reason_log_path = path;
        self
    }

    pub fn truncate_before_load(mut self, truncate: bool) -> Self {
        self.options.truncate_before_load = truncate;
        self
    }

    pub fn quoting(mut self, quoting: bool) -> Self {
        self.options.quoting = quoting;
        self
    }

    pub fn header_override(mut self, columns: Option<Vec<String>>) -> Self {
        self.options.header_override = columns;
        self
    }

    pub fn empty_as_null(mut self, empty_as_null: bool) -> Self {
        self.options.empty_as_null = empty_as_null;
        self
    }

    pub fn sink_ascii_only(mut self, ascii_only: bool) -> Self {
        self.options.sink_ascii_only = ascii_only;
        self
    }

    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.options.progress_interval = interval;
        self
    }

    pub fn build(self) -> LoadOptions {
        self.options
    }
}
