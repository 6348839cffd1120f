//! PostgreSQL load target
//!
//! Every insert runs inside an open transaction behind a savepoint, so a
//! rejected row rolls back only itself and the surrounding transaction stays
//! usable. `commit` ends the transaction; the next insert opens a new one.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use super::schema::{TargetColumn, TargetSchema};
use super::statement::{delete_sql, insert_sql, TableName};
use super::LoadTarget;
use crate::error::{LoadError, LoadResult, TargetError};

const ROW_SAVEPOINT: &str = "lobby_row";

const DESCRIBE_SQL: &str = r#"
    SELECT c.oid::regclass::text AS table_ref,
           a.attname::text AS column_name,
           a.attnum::int4 AS position,
           format_type(a.atttypid, a.atttypmod) AS sql_type,
           format_type(a.atttypid, -1) AS cast_type
    FROM pg_class c
    JOIN pg_attribute a ON a.attrelid = c.oid
    WHERE c.oid = to_regclass($1)
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

const TABLES_SQL: &str = r#"
    SELECT c.relname::text AS table_name
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relkind IN ('r', 'p')
    ORDER BY c.relname
"#;

/// Names of the ordinary and partitioned tables in `schema`
///
/// An upper-case schema name that matches nothing is retried in lower case,
/// the way unquoted identifiers fold.
pub async fn list_tables(pool: &PgPool, schema: &str) -> LoadResult<Vec<String>> {
    let mut candidates = vec![schema.to_string()];
    let folded = schema.to_lowercase();
    if folded != schema {
        candidates.push(folded);
    }

    for candidate in &candidates {
        let rows: Vec<(String,)> = sqlx::query_as(TABLES_SQL)
            .bind(candidate)
            .fetch_all(pool)
            .await
            .map_err(LoadError::Connection)?;
        if !rows.is_empty() {
            return Ok(rows.into_iter().map(|(name,)| name).collect());
        }
    }

    debug!(schema, "No tables in schema");
    Ok(Vec::new())
}

/// Look up a table's columns in the catalog
///
/// Returns the canonical SQL reference of the table (as PostgreSQL prints a
/// `regclass`) together with its columns in definition order. A typmod of
/// -1 makes `format_type` name the unbounded form (`bpchar`, `"bit"`)
/// rather than the one-character default.
pub async fn describe_table(
    pool: &PgPool,
    table: &TableName,
) -> LoadResult<(String, Vec<TargetColumn>)> {
    for candidate in table.lookup_candidates() {
        let rows = sqlx::query(DESCRIBE_SQL)
            .bind(&candidate)
            .fetch_all(pool)
            .await
            .map_err(LoadError::Connection)?;

        let Some(first) = rows.first() else {
            debug!(candidate = %candidate, "No table under this spelling");
            continue;
        };

        let table_ref: String = first.try_get("table_ref").map_err(LoadError::Connection)?;
        let columns = rows
            .iter()
            .map(|row| -> Result<TargetColumn, sqlx::Error> {
                let position: i32 = row.try_get("position")?;
                Ok(TargetColumn::new(
                    row.try_get::<String, _>("column_name")?,
                    usize::try_from(position).unwrap_or_default(),
                    row.try_get::<String, _>("sql_type")?,
                )
                .with_cast_type(row.try_get::<String, _>("cast_type")?))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(LoadError::Connection)?;

        return Ok((table_ref, columns));
    }

    Err(LoadError::TableNotFound(table.to_string()))
}

/// Inserts rows into an existing PostgreSQL table
pub struct PgTarget {
    pool: PgPool,
    table: TableName,
    schema: Option<TargetSchema>,
    insert_sql: String,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTarget {
    pub fn new(pool: PgPool, table: TableName) -> Self {
        Self {
            pool,
            table,
            schema: None,
            insert_sql: String::new(),
            tx: None,
        }
    }

    async fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, TargetError> {
        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| TargetError::fatal(format!("failed to begin transaction: {e}")))?;
            self.tx = Some(tx);
        }
        self.tx
            .as_mut()
            .ok_or_else(|| TargetError::fatal("transaction unavailable"))
    }
}

#[async_trait]
impl LoadTarget for PgTarget {
    fn table(&self) -> String {
        self.table.to_string()
    }

    async fn prepare(&mut self, columns: &[String]) -> LoadResult<TargetSchema> {
        let (table_ref, table_columns) = describe_table(&self.pool, &self.table).await?;
        let schema = TargetSchema::resolve(table_ref, columns, &table_columns)?;

        self.insert_sql = insert_sql(&schema);
        debug!(sql = %self.insert_sql, "Prepared insert statement");
        info!(
            table = %schema.table_ref(),
            columns = schema.len(),
            table_columns = table_columns.len(),
            "Resolved target schema"
        );

        self.schema = Some(schema.clone());
        Ok(schema)
    }

    async fn clear(&mut self) -> Result<u64, TargetError> {
        let sql = match &self.schema {
            Some(schema) => delete_sql(schema),
            None => return Err(TargetError::fatal("clear called before prepare")),
        };
        let tx = self.transaction().await?;
        let result = sqlx::query(&sql).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    async fn insert(&mut self, values: &[Option<&str>]) -> Result<(), TargetError> {
        let expected = match &self.schema {
            Some(schema) => schema.len(),
            None => return Err(TargetError::fatal("insert called before prepare")),
        };
        if values.len() != expected {
            return Err(TargetError::rejected(format!(
                "row has {} values but the insert expects {} columns",
                values.len(),
                expected
            )));
        }

        if self.tx.is_none() {
            self.transaction().await?;
        }
        let Some(tx) = self.tx.as_mut() else {
            return Err(TargetError::fatal("transaction unavailable"));
        };

        sqlx::query(&format!("SAVEPOINT {ROW_SAVEPOINT}"))
            .execute(&mut **tx)
            .await
            .map_err(|e| TargetError::fatal(format!("failed to create savepoint: {e}")))?;

        let mut query = sqlx::query(&self.insert_sql);
        for value in values {
            query = query.bind(*value);
        }

        match query.execute(&mut **tx).await {
            Ok(_) => {
                sqlx::query(&format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| TargetError::fatal(format!("failed to release savepoint: {e}")))?;
                Ok(())
            },
            Err(insert_err) => {
                sqlx::query(&format!("ROLLBACK TO SAVEPOINT {ROW_SAVEPOINT}"))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        TargetError::fatal(format!("failed to roll back to savepoint: {e}"))
                    })?;
                Err(insert_err.into())
            },
        }
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        if let Some(tx) = self.tx.take() {
            debug!(table = %self.table, "Rolling back uncommitted rows");
            tx.rollback().await?;
        }
        Ok(())
    }
}
