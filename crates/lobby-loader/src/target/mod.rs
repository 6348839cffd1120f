//! Load targets
//!
//! A [`LoadTarget`] is the database side of a load: it resolves the header
//! against the table, inserts one row at a time, and draws transaction
//! boundaries when the loader asks it to. A failed insert must leave the
//! target usable for the next row.

pub mod dry_run;
pub mod postgres;
pub mod schema;
pub mod statement;

use async_trait::async_trait;

use crate::error::{LoadResult, TargetError};

pub use dry_run::DryRunTarget;
pub use postgres::PgTarget;
pub use schema::{TargetColumn, TargetSchema};
pub use statement::TableName;

#[async_trait]
pub trait LoadTarget: Send {
    /// Table identifier, for logs and the load outcome
    fn table(&self) -> String;

    /// Resolve the header columns against the target table
    ///
    /// Called once per load before any row. Failure is fatal.
    async fn prepare(&mut self, columns: &[String]) -> LoadResult<TargetSchema>;

    /// Delete all existing rows, returning how many were removed
    async fn clear(&mut self) -> Result<u64, TargetError>;

    /// Insert one row; `values` follow the column order given to `prepare`
    ///
    /// `None` is bound as SQL NULL. A [`TargetError::Rejected`] leaves earlier
    /// uncommitted rows intact.
    async fn insert(&mut self, values: &[Option<&str>]) -> Result<(), TargetError>;

    /// Make every successful insert since the last commit durable
    async fn commit(&mut self) -> Result<(), TargetError>;

    /// Discard anything uncommitted and release the connection
    async fn close(&mut self) -> Result<(), TargetError>;
}
