//! Command implementations for the `lobby-load` binary

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::cli::{LoadArgs, SourceArgs};
use crate::db::{self, DbConfig};
use crate::loader;
use crate::outcome::LoadOutcome;
use crate::target::postgres::{describe_table, list_tables};
use crate::target::{DryRunTarget, PgTarget, TableName, TargetColumn};

/// Load one file into its table
pub async fn load(args: &LoadArgs) -> Result<LoadOutcome> {
    let table = args.table_name()?;
    let options = args.to_options(Local::now());

    let config = DbConfig::from_env().context("Failed to read database settings")?;
    let pool = db::connect(&config)
        .await
        .context("Failed to connect to database")?;

    let mut target = PgTarget::new(pool.clone(), table.clone());
    let result = loader::load(&args.source.file, &mut target, &options).await;
    pool.close().await;

    result.with_context(|| {
        format!(
            "Failed to load {} into {}",
            args.source.file.display(),
            table
        )
    })
}

/// Run the source through a dry-run target: width and encoding failures only
pub async fn check(args: &SourceArgs) -> Result<LoadOutcome> {
    let options = args.options_builder(Local::now()).build();
    let mut target = DryRunTarget::new(args.implied_table());

    let outcome = loader::load(&args.file, &mut target, &options)
        .await
        .with_context(|| format!("Failed to check {}", args.file.display()))?;

    if outcome.non_ascii_rows() > 0 {
        info!(
            rows = outcome.non_ascii_rows(),
            "File contains non-ASCII characters"
        );
    }
    Ok(outcome)
}

/// Fetch the canonical reference and columns of a table
pub async fn describe(table: &str) -> Result<(String, Vec<TargetColumn>)> {
    let table: TableName = table.parse()?;

    let config = DbConfig::from_env().context("Failed to read database settings")?;
    let pool = db::connect(&config)
        .await
        .context("Failed to connect to database")?;

    let result = describe_table(&pool, &table).await;
    pool.close().await;

    Ok(result?)
}

/// List the tables of one schema
pub async fn tables(schema: &str) -> Result<Vec<String>> {
    let config = DbConfig::from_env().context("Failed to read database settings")?;
    let pool = db::connect(&config)
        .await
        .context("Failed to connect to database")?;

    let result = list_tables(&pool, schema).await;
    pool.close().await;

    result.with_context(|| format!("Failed to list tables in schema {}", schema))
}

/// Render `describe` output as an aligned two-column listing
pub fn format_columns(table_ref: &str, columns: &[TargetColumn]) -> String {
    let width = columns
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);

    let mut out = format!("{}\n", table_ref);
    for column in columns {
        out.push_str(&format!(
            "  {:>3}  {:<width$}  {}\n",
            column.position,
            column.name,
            column.sql_type,
            width = width
        ));
    }
    out
}
