//! Target that accepts every well-formed row without a database
//!
//! Backs the `check` command: a load against it reports exactly the
//! failures that do not depend on the store (width and decoding).

use async_trait::async_trait;

use super::schema::TargetSchema;
use super::LoadTarget;
use crate::error::{LoadResult, TargetError};

#[derive(Debug, Default)]
pub struct DryRunTarget {
    table: String,
    width: usize,
    accepted: u64,
    committed: u64,
}

impl DryRunTarget {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Rows that passed `insert` (committed or not)
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }
}

#[async_trait]
impl LoadTarget for DryRunTarget {
    fn table(&self) -> String {
        self.table.clone()
    }

    async fn prepare(&mut self, columns: &[String]) -> LoadResult<TargetSchema> {
        self.width = columns.len();
        Ok(TargetSchema::untyped(self.table.clone(), columns))
    }

    async fn clear(&mut self) -> Result<u64, TargetError> {
        Ok(0)
    }

    async fn insert(&mut self, values: &[Option<&str>]) -> Result<(), TargetError> {
        if values.len() != self.width {
            return Err(TargetError::rejected(format!(
                "row has {} values but the insert expects {} columns",
                values.len(),
                self.width
            )));
        }
        self.accepted += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        self.committed = self.accepted;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        Ok(())
    }
}
