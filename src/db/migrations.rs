//! Ledger database bootstrap: connection pool, pragmas and schema.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Bumped whenever `schema.sql` changes shape; stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the ledger database and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(dir) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(sqlx::Error::Io)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { apply_pragmas(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    migrate(&pool).await?;
    info!(path = db_path, version = SCHEMA_VERSION, "Ledger database ready");
    Ok(pool)
}

/// Apply `schema.sql`. Statements are `IF NOT EXISTS`, so re-running is safe.
async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let current = schema_version(pool).await?;
    debug!(current, target = SCHEMA_VERSION, "Applying ledger schema");

    let mut tx = pool.begin().await?;
    for statement in include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if current != SCHEMA_VERSION {
        info!(from = current, to = SCHEMA_VERSION, "Ledger schema migrated");
    }
    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    Ok(row.get(0))
}

/// Per-connection settings. Foreign keys must be on for every connection,
/// since ledger rows reference their position.
async fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // Setting journal_mode reports the mode actually in effect.
    let mode: String = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?
        .get(0);
    debug!(journal_mode = %mode, "SQLite journal mode");

    for pragma in ["PRAGMA busy_timeout = 5000", "PRAGMA synchronous = NORMAL"] {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}
