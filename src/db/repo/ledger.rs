//! Cost basis, snapshot and closure operations for the repository.

use crate::domain::{
    CostBasisEntry, LedgerTransaction, NewCostBasisEntry, NewSnapshot, PositionClosure,
    PositionId, PositionReward, PositionSnapshot, TimeMs, TokenLeg,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use super::rewards::fetch_position_rewards;
use super::transactions::{insert_transaction_query, INSERT_TRANSACTION};
use super::{decimal_column, opt_decimal_column, Repository};

/// Result of appending a cost-basis entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostBasisInsert {
    Recorded(CostBasisEntry),
    /// A closure exists; nothing was written.
    PositionClosed,
    /// The referenced entry already has a reversal; nothing was written.
    AlreadyReversed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotInsert {
    Appended(PositionSnapshot),
    OutOfOrder { latest: TimeMs },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureInsert {
    Closed(PositionClosure),
    /// Another close won; carries the stored record.
    AlreadyClosed(PositionClosure),
}

impl Repository {
    // =========================================================================
    // Cost basis
    // =========================================================================

    /// Append a cost-basis entry unless the position is closed.
    ///
    /// The closure check and the insert are one statement, so an entry can
    /// never land after a concurrent close. `reverses_entry_id` is UNIQUE,
    /// which caps every entry at one reversal.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_cost_basis(
        &self,
        position_id: &PositionId,
        entry: &NewCostBasisEntry,
        reverses_entry_id: Option<i64>,
        recorded_at: TimeMs,
    ) -> Result<CostBasisInsert, sqlx::Error> {
        let leg_parts = |leg: &Option<TokenLeg>| {
            leg.as_ref().map_or((None, None, None), |l| {
                (
                    Some(l.symbol.clone()),
                    Some(l.amount.to_canonical_string()),
                    l.price_usd.map(|p| p.to_canonical_string()),
                )
            })
        };
        let (a_symbol, a_amount, a_price) = leg_parts(&entry.token_a);
        let (b_symbol, b_amount, b_price) = leg_parts(&entry.token_b);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO position_cost_basis (
                position_id, total_usd,
                token_a_symbol, token_a_amount, token_a_price_usd,
                token_b_symbol, token_b_amount, token_b_price_usd,
                deposited_at_ms, tx_hash, vault_address, reverses_entry_id, recorded_at_ms
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM position_closures WHERE position_id = ?)
            ON CONFLICT(reverses_entry_id) DO NOTHING
            "#,
        )
        .bind(position_id.as_str())
        .bind(entry.total_usd.to_canonical_string())
        .bind(a_symbol)
        .bind(a_amount)
        .bind(a_price)
        .bind(b_symbol)
        .bind(b_amount)
        .bind(b_price)
        .bind(entry.deposited_at.as_ms())
        .bind(entry.tx_hash.as_deref())
        .bind(entry.vault_address.as_deref())
        .bind(reverses_entry_id)
        .bind(recorded_at.as_ms())
        .bind(position_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let closed = sqlx::query("SELECT 1 FROM position_closures WHERE position_id = ?")
                .bind(position_id.as_str())
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            return Ok(if closed {
                CostBasisInsert::PositionClosed
            } else {
                CostBasisInsert::AlreadyReversed
            });
        }
        tx.commit().await?;

        Ok(CostBasisInsert::Recorded(CostBasisEntry {
            id: result.last_insert_rowid(),
            position_id: position_id.clone(),
            total_usd: entry.total_usd,
            token_a: entry.token_a.clone(),
            token_b: entry.token_b.clone(),
            deposited_at: entry.deposited_at,
            tx_hash: entry.tx_hash.clone(),
            vault_address: entry.vault_address.clone(),
            reverses_entry_id,
            recorded_at,
        }))
    }

    /// All entries of a position, reversals included, in recording order.
    pub async fn list_cost_basis(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<CostBasisEntry>, sqlx::Error> {
        fetch_cost_basis(&self.pool, position_id).await
    }

    pub async fn get_cost_basis_entry(
        &self,
        position_id: &PositionId,
        entry_id: i64,
    ) -> Result<Option<CostBasisEntry>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM position_cost_basis WHERE position_id = ? AND id = ?")
            .bind(position_id.as_str())
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cost_basis_from_row).transpose()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Append a snapshot only if it is strictly newer than every stored one.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_snapshot(
        &self,
        position_id: &PositionId,
        snapshot: &NewSnapshot,
    ) -> Result<SnapshotInsert, sqlx::Error> {
        let date_ms = snapshot.snapshot_date.as_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO position_snapshots (
                position_id, balance, balance_usd, price_usd, protocol_apy, snapshot_date_ms
            )
            SELECT ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM position_snapshots
                WHERE position_id = ? AND snapshot_date_ms >= ?
            )
            "#,
        )
        .bind(position_id.as_str())
        .bind(snapshot.balance.to_canonical_string())
        .bind(snapshot.balance_usd.to_canonical_string())
        .bind(snapshot.price_usd.to_canonical_string())
        .bind(snapshot.protocol_apy.map(|a| a.to_canonical_string()))
        .bind(date_ms)
        .bind(position_id.as_str())
        .bind(date_ms)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let latest: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(snapshot_date_ms) FROM position_snapshots WHERE position_id = ?",
            )
            .bind(position_id.as_str())
            .fetch_one(&self.pool)
            .await?;
            return Ok(SnapshotInsert::OutOfOrder {
                latest: TimeMs::new(latest.unwrap_or(date_ms)),
            });
        }

        Ok(SnapshotInsert::Appended(PositionSnapshot {
            id: result.last_insert_rowid(),
            position_id: position_id.clone(),
            balance: snapshot.balance,
            balance_usd: snapshot.balance_usd,
            price_usd: snapshot.price_usd,
            protocol_apy: snapshot.protocol_apy,
            snapshot_date: snapshot.snapshot_date,
        }))
    }

    pub async fn latest_snapshot(
        &self,
        position_id: &PositionId,
    ) -> Result<Option<PositionSnapshot>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM position_snapshots
            WHERE position_id = ?
            ORDER BY snapshot_date_ms DESC
            LIMIT 1
            "#,
        )
        .bind(position_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    // =========================================================================
    // Closures
    // =========================================================================

    /// Close a position inside one write transaction.
    ///
    /// The exit transaction is written first, which takes the database write
    /// lock. Cost basis and attributed rewards are then read under that lock
    /// and handed to `build`, so no deposit or attribution can land between
    /// the read and the closure insert. The first close for a position wins;
    /// later attempts roll back and receive the stored closure. An error
    /// from `build` also rolls back.
    ///
    /// # Errors
    /// Returns the builder's error, or a database error converted into `E`.
    pub async fn insert_closure<F, E>(
        &self,
        position_id: &PositionId,
        exit_transaction: &LedgerTransaction,
        build: F,
    ) -> Result<ClosureInsert, E>
    where
        F: FnOnce(&[CostBasisEntry], &[PositionReward]) -> Result<PositionClosure, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        insert_transaction_query(INSERT_TRANSACTION, exit_transaction)
            .execute(&mut *tx)
            .await?;

        if let Some(existing) = fetch_closure(&mut *tx, position_id).await? {
            tx.rollback().await?;
            return Ok(ClosureInsert::AlreadyClosed(existing));
        }

        let entries = fetch_cost_basis(&mut *tx, position_id).await?;
        let rewards = fetch_position_rewards(&mut *tx, position_id).await?;
        let closure = match build(&entries, &rewards) {
            Ok(closure) => closure,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        sqlx::query(
            r#"
            INSERT INTO position_closures (
                position_id, exit_date_ms, exit_value_usd, destination_account_id, tx_hash,
                cost_basis_usd, rewards_usd_at_close, realized_pnl_usd, realized_pnl_pct,
                transaction_id, closed_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(closure.position_id.as_str())
        .bind(closure.exit_date.as_ms())
        .bind(closure.exit_value_usd.to_canonical_string())
        .bind(&closure.destination_account_id)
        .bind(closure.tx_hash.as_deref())
        .bind(closure.cost_basis_usd.map(|c| c.to_canonical_string()))
        .bind(closure.rewards_usd_at_close.to_canonical_string())
        .bind(closure.realized_pnl_usd.map(|p| p.to_canonical_string()))
        .bind(closure.realized_pnl_pct.map(|p| p.to_canonical_string()))
        .bind(&closure.transaction_id)
        .bind(closure.closed_at.as_ms())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(ClosureInsert::Closed(closure))
    }

    pub async fn get_closure(
        &self,
        position_id: &PositionId,
    ) -> Result<Option<PositionClosure>, sqlx::Error> {
        fetch_closure(&self.pool, position_id).await
    }
}

async fn fetch_cost_basis<'e, E>(
    executor: E,
    position_id: &PositionId,
) -> Result<Vec<CostBasisEntry>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM position_cost_basis WHERE position_id = ? ORDER BY id ASC")
        .bind(position_id.as_str())
        .fetch_all(executor)
        .await?;
    rows.iter().map(cost_basis_from_row).collect()
}

async fn fetch_closure<'e, E>(
    executor: E,
    position_id: &PositionId,
) -> Result<Option<PositionClosure>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM position_closures WHERE position_id = ?")
        .bind(position_id.as_str())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(closure_from_row).transpose()
}

fn leg_from_row(row: &SqliteRow, prefix: &str) -> Result<Option<TokenLeg>, sqlx::Error> {
    let symbol: Option<String> = row.try_get(format!("{}_symbol", prefix).as_str())?;
    let Some(symbol) = symbol else {
        return Ok(None);
    };
    Ok(Some(TokenLeg {
        symbol,
        amount: decimal_column(row, &format!("{}_amount", prefix))?,
        price_usd: opt_decimal_column(row, &format!("{}_price_usd", prefix))?,
    }))
}

fn cost_basis_from_row(row: &SqliteRow) -> Result<CostBasisEntry, sqlx::Error> {
    Ok(CostBasisEntry {
        id: row.try_get("id")?,
        position_id: PositionId::new(row.try_get::<String, _>("position_id")?),
        total_usd: decimal_column(row, "total_usd")?,
        token_a: leg_from_row(row, "token_a")?,
        token_b: leg_from_row(row, "token_b")?,
        deposited_at: TimeMs::new(row.try_get("deposited_at_ms")?),
        tx_hash: row.try_get("tx_hash")?,
        vault_address: row.try_get("vault_address")?,
        reverses_entry_id: row.try_get("reverses_entry_id")?,
        recorded_at: TimeMs::new(row.try_get("recorded_at_ms")?),
    })
}

fn snapshot_from_row(row: &SqliteRow) -> Result<PositionSnapshot, sqlx::Error> {
    Ok(PositionSnapshot {
        id: row.try_get("id")?,
        position_id: PositionId::new(row.try_get::<String, _>("position_id")?),
        balance: decimal_column(row, "balance")?,
        balance_usd: decimal_column(row, "balance_usd")?,
        price_usd: decimal_column(row, "price_usd")?,
        protocol_apy: opt_decimal_column(row, "protocol_apy")?,
        snapshot_date: TimeMs::new(row.try_get("snapshot_date_ms")?),
    })
}

fn closure_from_row(row: &SqliteRow) -> Result<PositionClosure, sqlx::Error> {
    Ok(PositionClosure {
        position_id: PositionId::new(row.try_get::<String, _>("position_id")?),
        exit_date: TimeMs::new(row.try_get("exit_date_ms")?),
        exit_value_usd: decimal_column(row, "exit_value_usd")?,
        destination_account_id: row.try_get("destination_account_id")?,
        tx_hash: row.try_get("tx_hash")?,
        cost_basis_usd: opt_decimal_column(row, "cost_basis_usd")?,
        rewards_usd_at_close: decimal_column(row, "rewards_usd_at_close")?,
        realized_pnl_usd: opt_decimal_column(row, "realized_pnl_usd")?,
        realized_pnl_pct: opt_decimal_column(row, "realized_pnl_pct")?,
        transaction_id: row.try_get("transaction_id")?,
        closed_at: TimeMs::new(row.try_get("closed_at_ms")?),
    })
}
