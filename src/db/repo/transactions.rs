//! Ledger transaction rows.

use crate::domain::{LedgerTransaction, PositionId, TimeMs, TransactionKind};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::Row;

use super::{decimal_column, enum_column, Repository};

pub(super) const INSERT_TRANSACTION: &str = r#"
    INSERT INTO ledger_transactions (
        id, kind, account_id, position_id, reward_id, amount_usd,
        occurred_at_ms, tx_hash, description, created_at_ms
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub(super) fn insert_transaction_query<'q>(
    sql: &'q str,
    transaction: &'q LedgerTransaction,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    sqlx::query(sql)
        .bind(transaction.id.as_str())
        .bind(transaction.kind.as_str())
        .bind(transaction.account_id.as_deref())
        .bind(transaction.position_id.as_ref().map(|p| p.as_str()))
        .bind(transaction.reward_id)
        .bind(transaction.amount_usd.to_canonical_string())
        .bind(transaction.occurred_at.as_ms())
        .bind(transaction.tx_hash.as_deref())
        .bind(transaction.description.as_str())
        .bind(transaction.created_at.as_ms())
}

impl Repository {
    /// Insert the income transaction of a reward.
    ///
    /// `reward_id` is UNIQUE: returns false when the reward already has a
    /// transaction, in which case nothing was written.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_reward_transaction(
        &self,
        transaction: &LedgerTransaction,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!("{} ON CONFLICT(reward_id) DO NOTHING", INSERT_TRANSACTION.trim_end());
        let result = insert_transaction_query(&sql, transaction)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<LedgerTransaction>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM ledger_transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    pub async fn get_transaction_for_reward(
        &self,
        reward_id: i64,
    ) -> Result<Option<LedgerTransaction>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM ledger_transactions WHERE reward_id = ?")
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }
}

fn transaction_from_row(row: &SqliteRow) -> Result<LedgerTransaction, sqlx::Error> {
    Ok(LedgerTransaction {
        id: row.try_get("id")?,
        kind: enum_column(row, "kind", TransactionKind::parse)?,
        account_id: row.try_get("account_id")?,
        position_id: row
            .try_get::<Option<String>, _>("position_id")?
            .map(PositionId::new),
        reward_id: row.try_get("reward_id")?,
        amount_usd: decimal_column(row, "amount_usd")?,
        occurred_at: TimeMs::new(row.try_get("occurred_at_ms")?),
        tx_hash: row.try_get("tx_hash")?,
        description: row.try_get("description")?,
        created_at: TimeMs::new(row.try_get("created_at_ms")?),
    })
}
