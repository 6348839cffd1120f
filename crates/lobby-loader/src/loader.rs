//! Resilient row loader
//!
//! Streams a delimited file into a [`LoadTarget`] one row at a time. A row
//! that cannot be loaded (wrong width, undecodable bytes, rejected by the
//! store) is written to the error sink and the load carries on; only the
//! failures listed on [`LoadError`] stop it.
//!
//! # Example
//!
//! ```no_run
//! use lobby_loader::{db, load, LoadOptions, PgTarget, TableName};
//! use std::path::Path;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = db::connect(&db::DbConfig::from_env()?).await?;
//! let mut target = PgTarget::new(pool.clone(), "lexp_cd".parse::<TableName>()?);
//! let options = LoadOptions::builder("LEXP_CD_errors.tsv")
//!     .expected_column_count(Some(16))
//!     .build();
//!
//! let outcome = load(Path::new("LEXP_CD.TSV"), &mut target, &options).await?;
//! println!("{}", outcome);
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{CommitGranularity, LoadOptions};
use crate::error::{LoadError, LoadResult, TargetError};
use crate::outcome::LoadOutcome;
use crate::sink::{ErrorRecord, ErrorSink};
use crate::source::{SourceReader, SourceRecord, SourceRow};
use crate::target::LoadTarget;

/// Rejections logged at `warn`; later ones go to `debug` (the sink has them all)
const MAX_LOGGED_REJECTIONS: u64 = 20;

/// Load the file at `source` into `target`
///
/// Fatal errors are returned before any outcome exists. When the source
/// cannot be opened no error sink is created.
#[instrument(skip(target, options), fields(table = %target.table()))]
pub async fn load<T>(source: &Path, target: &mut T, options: &LoadOptions) -> LoadResult<LoadOutcome>
where
    T: LoadTarget + ?Sized,
{
    options.validate()?;
    let reader = SourceReader::open(source, options)?;
    load_from_reader(reader, target, options).await
}

/// Load from an already-opened source
pub async fn load_from_reader<R, T>(
    mut reader: SourceReader<R>,
    target: &mut T,
    options: &LoadOptions,
) -> LoadResult<LoadOutcome>
where
    R: Read,
    T: LoadTarget + ?Sized,
{
    options.validate()?;
    let result = run(&mut reader, target, options).await;

    // Release the target on every path; an open transaction is rolled back.
    let closed = target.close().await;
    let outcome = result?;
    closed?;

    info!(
        table = %outcome.table(),
        attempted = outcome.attempted(),
        committed = outcome.committed(),
        failed = outcome.failed(),
        non_ascii_rows = outcome.non_ascii_rows(),
        elapsed_ms = outcome.elapsed().as_millis() as u64,
        error_sink = %outcome.error_sink().display(),
        "Load complete"
    );

    Ok(outcome)
}

async fn run<R, T>(
    reader: &mut SourceReader<R>,
    target: &mut T,
    options: &LoadOptions,
) -> LoadResult<LoadOutcome>
where
    R: Read,
    T: LoadTarget + ?Sized,
{
    let started = Instant::now();
    let columns = reader.columns().to_vec();

    if let Some(expected) = options.expected_column_count {
        if expected != columns.len() {
            warn!(
                expected,
                header_columns = columns.len(),
                "Expected column count differs from the header width"
            );
        }
    }

    let schema = target.prepare(&columns).await?;
    let mut sink = ErrorSink::create(options)?;
    let mut outcome = LoadOutcome::start(
        target.table(),
        reader.path().to_path_buf(),
        sink.path().to_path_buf(),
    );

    info!(
        source = %reader.path().display(),
        columns = schema.len(),
        granularity = ?options.commit_granularity,
        error_sink = %sink.path().display(),
        "Starting load"
    );

    if options.truncate_before_load {
        let deleted = target.clear().await?;
        if options.commit_granularity == CommitGranularity::PerRow {
            target.commit().await?;
        }
        info!(rows_deleted = deleted, "Cleared target table");
        outcome.set_rows_deleted(deleted);
    }

    let mut pending: u64 = 0;
    while let Some(row) = reader.next_row()? {
        let (record, rejection) = match row {
            SourceRow::Decoded(record) => {
                let rejection = width_mismatch(&record, options.expected_column_count)
                    .map(Rejection::new);
                (record, rejection)
            },
            SourceRow::Undecodable { record, error } => {
                (record, Some(Rejection::new(format!("decode error: {}", error))))
            },
        };
        outcome.record_attempt(record.is_ascii());

        let rejection = match rejection {
            Some(reason) => Some(reason),
            None => insert_row(target, &record, options, &mut outcome, &mut pending).await?,
        };

        if let Some(Rejection { reason, code }) = rejection {
            outcome.record_failure();
            if outcome.failed() <= MAX_LOGGED_REJECTIONS {
                warn!(line = record.line, reason = %reason, code = ?code, "Row rejected");
            } else {
                debug!(line = record.line, reason = %reason, code = ?code, "Row rejected");
            }
            sink.write(&ErrorRecord::new(record, reason).with_code(code))?;
        }

        if outcome.attempted() % options.progress_interval == 0 {
            info!(
                attempted = outcome.attempted(),
                committed = outcome.committed(),
                pending,
                failed = outcome.failed(),
                "Load progress"
            );
        }
    }

    if options.commit_granularity == CommitGranularity::EndOfFile {
        target.commit().await?;
        outcome.record_commit(pending);
    }

    let reason_log = sink.reason_log_path().map(Path::to_path_buf);
    let sunk = sink.finish()?;
    debug!(rows = sunk, path = %outcome.error_sink().display(), "Closed error sink");
    outcome.finish(reason_log, started.elapsed());
    Ok(outcome)
}

/// Why a row went to the sink
#[derive(Debug, PartialEq, Eq)]
struct Rejection {
    reason: String,
    code: Option<String>,
}

impl Rejection {
    fn new(reason: String) -> Self {
        Self { reason, code: None }
    }
}

impl From<TargetError> for Rejection {
    fn from(err: TargetError) -> Self {
        Self {
            code: err.code().map(str::to_string),
            reason: err.to_string(),
        }
    }
}

fn width_mismatch(record: &SourceRecord, expected: Option<usize>) -> Option<String> {
    match expected {
        Some(expected) if expected != record.width() => Some(format!(
            "column count mismatch: expected {} got {}",
            expected,
            record.width()
        )),
        _ => None,
    }
}

/// Try to insert (and, per row, commit) one record
///
/// Returns the rejection for a row-level failure; fatal target errors are
/// propagated.
async fn insert_row<T>(
    target: &mut T,
    record: &SourceRecord,
    options: &LoadOptions,
    outcome: &mut LoadOutcome,
    pending: &mut u64,
) -> LoadResult<Option<Rejection>>
where
    T: LoadTarget + ?Sized,
{
    let values: Vec<Option<&str>> = record
        .fields
        .iter()
        .map(|field| {
            if options.empty_as_null && field.is_empty() {
                None
            } else {
                Some(field.as_str())
            }
        })
        .collect();

    if let Err(err) = target.insert(&values).await {
        if err.is_fatal() {
            return Err(LoadError::Target(err));
        }
        return Ok(Some(err.into()));
    }

    match options.commit_granularity {
        CommitGranularity::EndOfFile => {
            *pending += 1;
            Ok(None)
        },
        CommitGranularity::PerRow => match target.commit().await {
            Ok(()) => {
                outcome.record_commit(1);
                Ok(None)
            },
            Err(err) if err.is_fatal() => Err(LoadError::Target(err)),
            Err(err) => Ok(Some(err.into())),
        },
    }
}
