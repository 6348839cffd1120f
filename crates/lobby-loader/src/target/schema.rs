//! Target schema: header columns resolved against a table definition

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};

/// One column of the target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetColumn {
    pub name: String,
    /// 1-based position in the table definition
    pub position: usize,
    /// Declared type with its modifiers, e.g. `character(5)`
    pub sql_type: String,
    /// Type a bound value is cast to before assignment
    ///
    /// Carries no length modifier: an explicit cast to `character(5)` would
    /// truncate, while assignment to the column rejects a value that does
    /// not fit.
    #[serde(skip)]
    pub cast_type: String,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, position: usize, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        Self {
            name: name.into(),
            position,
            cast_type: sql_type.clone(),
            sql_type,
        }
    }

    pub fn with_cast_type(mut self, cast_type: impl Into<String>) -> Self {
        self.cast_type = cast_type.into();
        self
    }
}

/// Columns an insert writes, in header order
///
/// Built once per load and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSchema {
    table_ref: String,
    columns: Vec<TargetColumn>,
}

impl TargetSchema {
    pub fn new(table_ref: impl Into<String>, columns: Vec<TargetColumn>) -> Self {
        Self {
            table_ref: table_ref.into(),
            columns,
        }
    }

    /// Schema for targets without a catalog: every header column is text
    pub fn untyped(table_ref: impl Into<String>, header: &[String]) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, name)| TargetColumn::new(name.clone(), idx + 1, "text"))
            .collect();
        Self::new(table_ref, columns)
    }

    /// Map each header name onto a table column
    ///
    /// Exact matches win; otherwise an ASCII case-insensitive match is used.
    /// A header name with no match, or two header names landing on the same
    /// column, is fatal.
    pub fn resolve(
        table_ref: impl Into<String>,
        header: &[String],
        table_columns: &[TargetColumn],
    ) -> LoadResult<Self> {
        let table_ref = table_ref.into();
        let exact: HashMap<&str, &TargetColumn> =
            table_columns.iter().map(|c| (c.name.as_str(), c)).collect();

        let mut columns: Vec<TargetColumn> = Vec::with_capacity(header.len());
        for name in header {
            let column = exact
                .get(name.as_str())
                .copied()
                .or_else(|| {
                    table_columns
                        .iter()
                        .find(|c| c.name.eq_ignore_ascii_case(name))
                })
                .ok_or_else(|| LoadError::UnknownColumn {
                    table: table_ref.clone(),
                    column: name.clone(),
                })?;

            if columns.iter().any(|c| c.position == column.position) {
                return Err(LoadError::MalformedHeader(format!(
                    "header column '{}' maps to column '{}' more than once",
                    name, column.name
                )));
            }
            columns.push(column.clone());
        }

        Ok(Self { table_ref, columns })
    }

    /// Table reference as it should appear in SQL
    pub fn table_ref(&self) -> &str {
        &self.table_ref
    }

    pub fn columns(&self) -> &[TargetColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
