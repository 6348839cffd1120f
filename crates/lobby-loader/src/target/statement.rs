//! SQL text for the PostgreSQL target
//!
//! Identifiers are always double-quoted; row values only ever travel as bind
//! parameters.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::schema::TargetSchema;
use crate::error::LoadError;

/// A possibly schema-qualified table name, e.g. `lexp_cd` or `calaccess.lexp_cd`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Quoted spellings to try when looking the table up, most exact first
    ///
    /// CAL-ACCESS file names are upper case while tables are usually created
    /// unquoted (and therefore folded to lower case).
    pub fn lookup_candidates(&self) -> Vec<String> {
        let exact = self.quoted();
        let folded = TableName {
            schema: self.schema.as_ref().map(|s| s.to_lowercase()),
            name: self.name.to_lowercase(),
        }
        .quoted();

        if folded == exact {
            vec![exact]
        } else {
            vec![exact, folded]
        }
    }

    /// Fully quoted reference such as `"calaccess"."lexp_cd"`
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

impl FromStr for TableName {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| LoadError::InvalidOptions(format!("invalid table name '{}': {}", s, why));

        if s.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let parts: Vec<&str> = s.split('.').map(str::trim).collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(TableName::new(*name)),
            [schema, name] if !schema.is_empty() && !name.is_empty() => {
                Ok(TableName::with_schema(*schema, *name))
            },
            [_] | [_, _] => Err(invalid("empty identifier")),
            _ => Err(invalid("expected 'table' or 'schema.table'")),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Parameterized insert for the resolved schema
///
/// Each parameter is bound as text and cast to the column's unmodified type,
/// so the store performs the same input conversion it would for a literal and
/// the column still checks length on assignment.
pub fn insert_sql(schema: &TargetSchema) -> String {
    let columns = schema
        .columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let params = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, c)| format!("${}::{}", idx + 1, c.cast_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.table_ref(),
        columns,
        params
    )
}

pub fn delete_sql(schema: &TargetSchema) -> String {
    format!("DELETE FROM {}", schema.table_ref())
}
