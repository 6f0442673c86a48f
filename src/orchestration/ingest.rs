//! Ingestion of the wallet sync feed and the reward claim feed.

use crate::db::Repository;
use crate::domain::{Address, Decimal, Position, PositionId, ProtocolModule, RewardClaim, TimeMs};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One active position as delivered by the wallet sync feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSyncItem {
    /// Derived from wallet, chain, protocol and vault when absent.
    #[serde(default)]
    pub position_id: Option<String>,
    pub chain_id: String,
    pub protocol: String,
    pub protocol_module: ProtocolModule,
    #[serde(default)]
    pub vault_address: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub price_usd: Decimal,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub records_fetched: usize,
    pub records_stored: usize,
}

#[derive(Clone)]
pub struct SyncIngestor {
    repo: Arc<Repository>,
}

impl SyncIngestor {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Upsert the wallet's positions. A closed position is refreshed but
    /// stays closed.
    pub async fn ingest_positions(
        &self,
        wallet: &Address,
        items: Vec<PositionSyncItem>,
    ) -> Result<IngestionResult, LedgerError> {
        if wallet.as_str().is_empty() {
            return Err(LedgerError::Validation("wallet is required".to_string()));
        }
        let now = TimeMs::now();
        let positions = items
            .into_iter()
            .map(|item| position_from_item(wallet, item, now))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.repo.upsert_positions(&positions).await?;
        info!(wallet = %wallet, fetched = positions.len(), stored, "Positions synced");
        Ok(IngestionResult {
            records_fetched: positions.len(),
            records_stored: stored,
        })
    }

    /// Store claims as unattributed rewards; known claims are skipped.
    pub async fn ingest_reward_claims(
        &self,
        claims: Vec<RewardClaim>,
    ) -> Result<IngestionResult, LedgerError> {
        for claim in &claims {
            validate_claim(claim)?;
        }
        let stored = self.repo.insert_reward_claims(&claims).await?;
        info!(fetched = claims.len(), stored, "Reward claims ingested");
        Ok(IngestionResult {
            records_fetched: claims.len(),
            records_stored: stored,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn position_from_item(
    wallet: &Address,
    item: PositionSyncItem,
    now: TimeMs,
) -> Result<Position, LedgerError> {
    if item.chain_id.trim().is_empty() || item.protocol.trim().is_empty() {
        return Err(LedgerError::Validation(
            "chain_id and protocol are required".to_string(),
        ));
    }
    if item.balance.is_negative() || item.balance_usd.is_negative() || item.price_usd.is_negative() {
        return Err(LedgerError::Validation(format!(
            "negative balance or price for {} on {}",
            item.protocol, item.chain_id
        )));
    }

    let position_id = match (non_empty(item.position_id), non_empty(item.vault_address)) {
        (Some(id), _) => PositionId::new(id),
        (None, Some(vault)) => PositionId::derive(wallet, &item.chain_id, &item.protocol, &vault),
        (None, None) => {
            return Err(LedgerError::Validation(format!(
                "position on {} {} needs a position_id or vault_address",
                item.chain_id, item.protocol
            )))
        }
    };

    Ok(Position {
        position_id,
        wallet_address: wallet.clone(),
        chain_id: item.chain_id.trim().to_string(),
        protocol: item.protocol.trim().to_string(),
        protocol_module: item.protocol_module,
        token_name: non_empty(item.token_name),
        token_symbol: non_empty(item.token_symbol),
        balance: item.balance,
        balance_usd: item.balance_usd,
        price_usd: item.price_usd,
        logo_url: non_empty(item.logo_url),
        updated_at: now,
    })
}

fn validate_claim(claim: &RewardClaim) -> Result<(), LedgerError> {
    if claim.wallet_address.trim().is_empty()
        || claim.chain_id.trim().is_empty()
        || claim.token_address.trim().is_empty()
    {
        return Err(LedgerError::Validation(
            "wallet_address, chain_id and token_address are required".to_string(),
        ));
    }
    if claim.token_amount.is_negative() || claim.fiat_value.is_negative() {
        return Err(LedgerError::Validation(format!(
            "negative reward amount in claim {}",
            claim.event_key()
        )));
    }
    if claim.block_timestamp < 0 {
        return Err(LedgerError::Validation(format!(
            "invalid block_timestamp {}",
            claim.block_timestamp
        )));
    }
    Ok(())
}
