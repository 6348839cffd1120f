//! Delimited source reader
//!
//! Splits records with `csv_core` and decodes per field under the declared
//! encoding policy instead of failing the whole stream on the first bad byte.
//! Blank lines are surfaced as zero-width records so they are counted and
//! rejected like any other malformed line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::LoadOptions;
use crate::encoding::{DecodeError, FieldDecoder};
use crate::error::{LoadError, LoadResult};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One data line of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// 1-based record number, header excluded; blank lines count
    pub line: u64,
    pub fields: Vec<String>,
}

impl SourceRecord {
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn is_ascii(&self) -> bool {
        self.fields.iter().all(|f| f.is_ascii())
    }
}

/// Result of reading one data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRow {
    Decoded(SourceRecord),
    /// Strict decoding failed; `record` holds the lossy rendering for the sink
    Undecodable {
        record: SourceRecord,
        error: DecodeError,
    },
}

/// Raw record splitter over a buffered byte stream
///
/// `csv_core` discards empty lines at the start of a record. A bare
/// terminator found there is consumed here instead and reported as a record
/// with no fields.
struct RecordReader<R> {
    input: BufReader<R>,
    core: csv_core::Reader,
    output: Vec<u8>,
    ends: Vec<usize>,
    len: usize,
    // The previous record ended on `\r`; a following `\n` belongs to it
    pending_lf: bool,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    fn new(reader: R, options: &LoadOptions) -> Self {
        let core = csv_core::ReaderBuilder::new()
            .delimiter(options.delimiter.as_byte())
            .quoting(options.quoting)
            .build();
        Self {
            input: BufReader::new(reader),
            core,
            output: vec![0; 1024],
            ends: vec![0; 32],
            len: 0,
            pending_lf: false,
            done: false,
        }
    }

    /// Read the next record; `false` at end of input
    fn read(&mut self) -> io::Result<bool> {
        use csv_core::ReadRecordResult::*;

        self.len = 0;
        if self.done {
            return Ok(false);
        }

        let mut at_start = true;
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let input = self.input.fill_buf()?;
            if at_start {
                let first = input.first().copied();
                if self.pending_lf && first == Some(b'\n') {
                    self.pending_lf = false;
                    self.input.consume(1);
                    continue;
                }
                self.pending_lf = false;
                if let Some(terminator @ (b'\n' | b'\r')) = first {
                    self.input.consume(1);
                    self.pending_lf = terminator == b'\r';
                    return Ok(true);
                }
                at_start = false;
            }

            let (res, nin, nout, nend) = self.core.read_record(
                input,
                &mut self.output[outlen..],
                &mut self.ends[endlen..],
            );
            let last = nin.checked_sub(1).and_then(|i| input.get(i)).copied();
            self.input.consume(nin);
            outlen += nout;
            endlen += nend;

            match res {
                InputEmpty => continue,
                OutputFull => {
                    let len = self.output.len();
                    self.output.resize(len * 2, 0);
                },
                OutputEndsFull => {
                    let len = self.ends.len();
                    self.ends.resize(len * 2, 0);
                },
                Record => {
                    self.len = endlen;
                    self.pending_lf = last == Some(b'\r');
                    return Ok(true);
                },
                End => {
                    self.done = true;
                    return Ok(false);
                },
            }
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Fields of the last record read
    fn fields(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut start = 0;
        self.ends[..self.len].iter().map(move |&end| {
            let field = &self.output[start..end];
            start = end;
            field
        })
    }
}

/// Streaming reader over a header-first delimited file
pub struct SourceReader<R: Read> {
    path: PathBuf,
    records: RecordReader<R>,
    decoder: FieldDecoder,
    columns: Vec<String>,
    records_read: u64,
}

impl SourceReader<File> {
    /// Open `path` and consume its header row
    pub fn open(path: &Path, options: &LoadOptions) -> LoadResult<Self> {
        let file = File::open(path).map_err(|source| LoadError::SourceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, path, options)
    }
}

impl<R: Read> SourceReader<R> {
    /// Wrap an arbitrary reader; `label` is only used in diagnostics
    pub fn from_reader(reader: R, label: impl Into<PathBuf>, options: &LoadOptions) -> LoadResult<Self> {
        let mut source = Self {
            path: label.into(),
            records: RecordReader::new(reader, options),
            decoder: FieldDecoder::new(options.encoding, options.encoding_error_policy),
            columns: Vec::new(),
            records_read: 0,
        };

        source.columns = match &options.header_override {
            Some(columns) => validate_header(columns.clone())?,
            None => source.read_header()?,
        };

        Ok(source)
    }

    /// Column names in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next data line, or `None` at end of input
    ///
    /// Decoding problems are returned as [`SourceRow::Undecodable`]; only I/O
    /// failures are errors. A blank line comes back as a record with no
    /// fields.
    pub fn next_row(&mut self) -> LoadResult<Option<SourceRow>> {
        if !self.read_raw()? {
            return Ok(None);
        }
        self.records_read += 1;
        let line = self.records_read;

        let mut fields = Vec::with_capacity(self.records.len());
        let mut failure = None;
        for raw in self.records.fields() {
            match self.decoder.decode(raw) {
                Ok(field) => fields.push(field),
                Err(error) => {
                    failure = Some(error);
                    break;
                },
            }
        }

        Ok(Some(match failure {
            None => SourceRow::Decoded(SourceRecord { line, fields }),
            Some(error) => {
                let fields = self
                    .records
                    .fields()
                    .map(|raw| self.decoder.decode_lossy(raw))
                    .collect();
                SourceRow::Undecodable {
                    record: SourceRecord { line, fields },
                    error,
                }
            },
        }))
    }

    fn read_raw(&mut self) -> LoadResult<bool> {
        self.records.read().map_err(|e| LoadError::SourceRead {
            path: self.path.clone(),
            line: self.records_read,
            message: e.to_string(),
        })
    }

    fn read_header(&mut self) -> LoadResult<Vec<String>> {
        // Blank lines ahead of the header are not data
        loop {
            if !self.read_raw()? {
                return Err(LoadError::MalformedHeader(
                    "source is empty, expected a header row".to_string(),
                ));
            }
            if self.records.len() > 0 {
                break;
            }
        }

        let decoder = self.decoder;
        let names = self
            .records
            .fields()
            .enumerate()
            .map(|(idx, raw)| {
                let raw = if idx == 0 {
                    raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
                } else {
                    raw
                };
                decoder.decode(raw).map_err(|e| {
                    LoadError::MalformedHeader(format!(
                        "column {} ('{}'): {}",
                        idx + 1,
                        decoder.decode_lossy(raw),
                        e
                    ))
                })
            })
            .collect::<LoadResult<Vec<_>>>()?;

        validate_header(names)
    }
}

/// Trim column names and reject empty or duplicate ones
pub fn validate_header(names: Vec<String>) -> LoadResult<Vec<String>> {
    if names.is_empty() {
        return Err(LoadError::MalformedHeader("no columns".to_string()));
    }

    let mut seen = HashSet::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LoadError::MalformedHeader(format!(
                "column {} has an empty name",
                idx + 1
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(LoadError::MalformedHeader(format!(
                "duplicate column name '{}'",
                name
            )));
        }
        columns.push(name);
    }
    Ok(columns)
}
