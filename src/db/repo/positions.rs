//! Position upserts and lookups for the repository.

use crate::domain::{Address, Position, PositionId, ProtocolModule, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decimal_column, enum_column, Repository};

const POSITION_COLUMNS: &str = r#"
    position_id, wallet_address, chain_id, protocol, protocol_module,
    token_name, token_symbol, balance, balance_usd, price_usd, logo_url, updated_at_ms
"#;

impl Repository {
    /// Insert or refresh positions from one sync in a single transaction.
    ///
    /// Closure state lives in `position_closures`, so a refresh never
    /// reopens a closed position.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_positions(&self, positions: &[Position]) -> Result<usize, sqlx::Error> {
        if positions.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for position in positions {
            sqlx::query(
                r#"
                INSERT INTO positions (
                    position_id, wallet_address, chain_id, protocol, protocol_module,
                    token_name, token_symbol, balance, balance_usd, price_usd, logo_url, updated_at_ms
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(position_id) DO UPDATE SET
                    protocol_module = excluded.protocol_module,
                    token_name = COALESCE(excluded.token_name, positions.token_name),
                    token_symbol = COALESCE(excluded.token_symbol, positions.token_symbol),
                    balance = excluded.balance,
                    balance_usd = excluded.balance_usd,
                    price_usd = excluded.price_usd,
                    logo_url = COALESCE(excluded.logo_url, positions.logo_url),
                    updated_at_ms = excluded.updated_at_ms
                "#,
            )
            .bind(position.position_id.as_str())
            .bind(position.wallet_address.as_str())
            .bind(&position.chain_id)
            .bind(&position.protocol)
            .bind(position.protocol_module.as_str())
            .bind(position.token_name.as_deref())
            .bind(position.token_symbol.as_deref())
            .bind(position.balance.to_canonical_string())
            .bind(position.balance_usd.to_canonical_string())
            .bind(position.price_usd.to_canonical_string())
            .bind(position.logo_url.as_deref())
            .bind(position.updated_at.as_ms())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(positions.len())
    }

    pub async fn get_position(&self, id: &PositionId) -> Result<Option<Position>, sqlx::Error> {
        let sql = format!("SELECT {} FROM positions WHERE position_id = ?", POSITION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    /// All positions of a wallet, open and closed, in id order.
    pub async fn list_positions(&self, wallet: &Address) -> Result<Vec<Position>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM positions WHERE wallet_address = ? ORDER BY position_id ASC",
            POSITION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(wallet.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(position_from_row).collect()
    }
}

fn position_from_row(row: &SqliteRow) -> Result<Position, sqlx::Error> {
    Ok(Position {
        position_id: PositionId::new(row.try_get::<String, _>("position_id")?),
        wallet_address: Address::new(row.try_get("wallet_address")?),
        chain_id: row.try_get("chain_id")?,
        protocol: row.try_get("protocol")?,
        protocol_module: enum_column(row, "protocol_module", ProtocolModule::parse)?,
        token_name: row.try_get("token_name")?,
        token_symbol: row.try_get("token_symbol")?,
        balance: decimal_column(row, "balance")?,
        balance_usd: decimal_column(row, "balance_usd")?,
        price_usd: decimal_column(row, "price_usd")?,
        logo_url: row.try_get("logo_url")?,
        updated_at: TimeMs::new(row.try_get("updated_at_ms")?),
    })
}
