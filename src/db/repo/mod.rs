//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `positions.rs` - Position upserts from the sync feed
//! - `ledger.rs` - Cost basis, snapshots and closures
//! - `rewards.rs` - Reward ingestion and attribution
//! - `transactions.rs` - Ledger transactions spawned from rewards
//!
//! Terminal transitions are single conditional statements; callers get a
//! typed outcome back instead of racing on a read-then-write.

mod ledger;
mod positions;
mod rewards;
mod transactions;

pub use ledger::{ClosureInsert, CostBasisInsert, SnapshotInsert};

use crate::domain::Decimal;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for database operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query to prove the database is reachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

/// Read a canonical decimal string column.
///
/// Money is stored as TEXT; a malformed value is a decode error, never a
/// silent zero.
pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str_canonical(&raw)
        .map_err(|e| decode_error(column, format!("invalid decimal {:?}: {}", raw, e)))
}

pub(crate) fn opt_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Decimal::from_str_canonical(&s)
            .map_err(|e| decode_error(column, format!("invalid decimal {:?}: {}", s, e)))
    })
    .transpose()
}

/// Read a TEXT column holding a closed enum value.
pub(crate) fn enum_column<T>(
    row: &SqliteRow,
    column: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| decode_error(column, format!("unknown value {:?}", raw)))
}
