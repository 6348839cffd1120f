//! Error sink for rejected rows
//!
//! The sink file uses the source delimiter, has no header, and holds one
//! rejected row per line in source order, so it can be fed straight back into
//! the loader with `--columns`. Each record is flushed as soon as it is
//! written; a killed run leaves a sink that is complete up to the last
//! processed line.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::LoadOptions;
use crate::encoding::strip_non_ascii;
use crate::error::{LoadError, LoadResult};
use crate::source::SourceRecord;

/// A rejected row and why it was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub line: u64,
    pub reason: String,
    /// SQLSTATE of a store rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub fields: Vec<String>,
}

impl ErrorRecord {
    pub fn new(record: SourceRecord, reason: impl Into<String>) -> Self {
        Self {
            line: record.line,
            reason: reason.into(),
            code: None,
            fields: record.fields,
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }
}

/// Writer for rejected rows plus an optional JSON-lines reason log
pub struct ErrorSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    reasons: Option<ReasonLog>,
    ascii_only: bool,
    written: u64,
}

struct ReasonLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ErrorSink {
    /// Create (or truncate) the sink and, if configured, the reason log
    pub fn create(options: &LoadOptions) -> LoadResult<Self> {
        let path = options.error_sink_path.clone();
        let file = File::create(&path).map_err(|source| LoadError::SinkOpen {
            path: path.clone(),
            source,
        })?;

        let quote_style = if options.quoting {
            csv::QuoteStyle::Necessary
        } else {
            csv::QuoteStyle::Never
        };
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter.as_byte())
            .quote_style(quote_style)
            .from_writer(file);

        let reasons = match &options.reason_log_path {
            Some(reason_path) => {
                let file = File::create(reason_path).map_err(|source| LoadError::SinkOpen {
                    path: reason_path.clone(),
                    source,
                })?;
                Some(ReasonLog {
                    path: reason_path.clone(),
                    writer: BufWriter::new(file),
                })
            },
            None => None,
        };

        Ok(Self {
            path,
            writer,
            reasons,
            ascii_only: options.sink_ascii_only,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reason_log_path(&self) -> Option<&Path> {
        self.reasons.as_ref().map(|r| r.path.as_path())
    }

    /// Persist one rejected row
    pub fn write(&mut self, record: &ErrorRecord) -> LoadResult<()> {
        let written = if self.ascii_only {
            let sanitized: Vec<String> = record.fields.iter().map(|f| strip_non_ascii(f)).collect();
            self.writer.write_record(&sanitized)
        } else {
            self.writer.write_record(&record.fields)
        };
        written.map_err(|e| LoadError::sink_write(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| LoadError::sink_write(&self.path, e))?;

        if let Some(reasons) = self.reasons.as_mut() {
            serde_json::to_writer(&mut reasons.writer, record)
                .map_err(|e| LoadError::sink_write(&reasons.path, e))?;
            reasons
                .writer
                .write_all(b"\n")
                .and_then(|_| reasons.writer.flush())
                .map_err(|e| LoadError::sink_write(&reasons.path, e))?;
        }

        self.written += 1;
        Ok(())
    }

    /// Flush and close both files
    pub fn finish(mut self) -> LoadResult<u64> {
        self.writer
            .flush()
            .map_err(|e| LoadError::sink_write(&self.path, e))?;
        if let Some(mut reasons) = self.reasons.take() {
            reasons
                .writer
                .flush()
                .map_err(|e| LoadError::sink_write(&reasons.path, e))?;
        }
        Ok(self.written)
    }
}

/// Default sink path next to the source: `<stem>_errors.<ext>`
///
/// With a timestamp the name becomes `<stem>_errors_<YYYYMMDDHHMMSSmmm>.<ext>`
/// so that repeated runs do not overwrite each other.
pub fn default_error_sink_path(
    source: &Path,
    extension: &str,
    timestamp: Option<DateTime<Local>>,
) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "load".to_string());

    let name = match timestamp {
        Some(ts) => format!("{}_errors_{}.{}", stem, ts.format("%Y%m%d%H%M%S%3f"), extension),
        None => format!("{}_errors.{}", stem, extension),
    };

    source.with_file_name(name)
}
