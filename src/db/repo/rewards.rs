//! Reward ingestion and attribution operations for the repository.

use crate::domain::{Address, PositionId, PositionReward, RewardClaim, RewardSource, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use super::{decimal_column, enum_column, Repository};

/// Reward columns plus the id of a linked transaction, if any.
const REWARD_SELECT: &str = r#"
    SELECT r.id, r.event_key, r.wallet_address, r.chain_id, r.token_address,
           r.reward_token_symbol, r.reward_amount, r.reward_usd, r.claimed_at_ms,
           r.tx_hash, r.source, r.is_attributed, r.position_id,
           t.id AS transaction_id
    FROM position_rewards r
    LEFT JOIN ledger_transactions t ON t.reward_id = r.id
"#;

impl Repository {
    /// Store claims as unattributed rewards, skipping known event keys.
    ///
    /// Returns the number of newly inserted rewards (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_reward_claims(&self, claims: &[RewardClaim]) -> Result<usize, sqlx::Error> {
        if claims.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for claim in claims {
            let result = sqlx::query(
                r#"
                INSERT INTO position_rewards (
                    event_key, wallet_address, chain_id, token_address, reward_token_symbol,
                    reward_amount, reward_usd, claimed_at_ms, tx_hash, source
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_key) DO NOTHING
                "#,
            )
            .bind(claim.event_key())
            .bind(Address::new(claim.wallet_address.clone()).as_str())
            .bind(claim.chain_id.trim())
            .bind(claim.token_address.trim().to_lowercase())
            .bind(claim.symbol())
            .bind(claim.token_amount.to_canonical_string())
            .bind(claim.fiat_value.to_canonical_string())
            .bind(claim.claimed_at().as_ms())
            .bind(claim.tx_hash.as_deref())
            .bind(claim.source.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    pub async fn get_reward(&self, id: i64) -> Result<Option<PositionReward>, sqlx::Error> {
        let sql = format!("{} WHERE r.id = ?", REWARD_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(reward_from_row).transpose()
    }

    /// Atomically flip `is_attributed` from 0 to 1.
    ///
    /// Returns true only for the caller that performed the transition.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn try_attribute_reward(
        &self,
        reward_id: i64,
        position_id: &PositionId,
        at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE position_rewards
            SET is_attributed = 1, position_id = ?, attributed_at_ms = ?
            WHERE id = ? AND is_attributed = 0
            "#,
        )
        .bind(position_id.as_str())
        .bind(at.as_ms())
        .bind(reward_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewards attributed to a position, oldest claim first.
    pub async fn list_position_rewards(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<PositionReward>, sqlx::Error> {
        fetch_position_rewards(&self.pool, position_id).await
    }

    pub async fn list_wallet_rewards(
        &self,
        wallet: &Address,
        unattributed_only: bool,
    ) -> Result<Vec<PositionReward>, sqlx::Error> {
        let filter = if unattributed_only {
            " AND r.is_attributed = 0"
        } else {
            ""
        };
        let sql = format!(
            "{} WHERE r.wallet_address = ?{} ORDER BY r.claimed_at_ms ASC, r.id ASC",
            REWARD_SELECT, filter
        );
        let rows = sqlx::query(&sql)
            .bind(wallet.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(reward_from_row).collect()
    }
}

pub(super) async fn fetch_position_rewards<'e, E>(
    executor: E,
    position_id: &PositionId,
) -> Result<Vec<PositionReward>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE r.position_id = ? AND r.is_attributed = 1 ORDER BY r.claimed_at_ms ASC, r.id ASC",
        REWARD_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(position_id.as_str())
        .fetch_all(executor)
        .await?;
    rows.iter().map(reward_from_row).collect()
}

fn reward_from_row(row: &SqliteRow) -> Result<PositionReward, sqlx::Error> {
    Ok(PositionReward {
        id: row.try_get("id")?,
        event_key: row.try_get("event_key")?,
        wallet_address: Address::new(row.try_get("wallet_address")?),
        chain_id: row.try_get("chain_id")?,
        token_address: row.try_get("token_address")?,
        reward_token_symbol: row.try_get("reward_token_symbol")?,
        reward_amount: decimal_column(row, "reward_amount")?,
        reward_usd: decimal_column(row, "reward_usd")?,
        claimed_at: TimeMs::new(row.try_get("claimed_at_ms")?),
        tx_hash: row.try_get("tx_hash")?,
        source: enum_column(row, "source", RewardSource::parse)?,
        is_attributed: row.try_get::<i64, _>("is_attributed")? != 0,
        position_id: row
            .try_get::<Option<String>, _>("position_id")?
            .map(PositionId::new),
        transaction_id: row.try_get("transaction_id")?,
    })
}
