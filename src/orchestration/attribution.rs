//! Reward attribution and reward-to-transaction conversion.

use crate::db::Repository;
use crate::domain::{LedgerTransaction, PositionId, PositionReward, TimeMs, TransactionKind};
use crate::engine::rewards::{aggregate_by_month, aggregate_by_token};
use crate::engine::{RewardMonthTotal, RewardTokenTotal};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Successful result of an attribute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionOutcome {
    /// This call performed the transition.
    Attributed,
    /// The reward was already attributed to the same position.
    AlreadyAttributed,
}

/// Per-id result of a batch attribution.
#[derive(Debug)]
pub struct BatchAttributionItem {
    pub reward_id: i64,
    pub result: Result<AttributionOutcome, LedgerError>,
}

#[derive(Clone)]
pub struct RewardAttributor {
    repo: Arc<Repository>,
}

impl RewardAttributor {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    async fn require_reward(&self, reward_id: i64) -> Result<PositionReward, LedgerError> {
        self.repo
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("reward {}", reward_id)))
    }

    /// Attribute one reward to a position.
    ///
    /// Re-attributing to the same position is a no-op; attributing to a
    /// different one is a `Conflict`.
    pub async fn attribute(
        &self,
        reward_id: i64,
        position_id: &PositionId,
    ) -> Result<AttributionOutcome, LedgerError> {
        let reward = self.require_reward(reward_id).await?;
        let position = self
            .repo
            .get_position(position_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("position {}", position_id)))?;
        if reward.wallet_address != position.wallet_address {
            return Err(LedgerError::Validation(format!(
                "reward {} belongs to wallet {}, position {} to {}",
                reward_id, reward.wallet_address, position_id, position.wallet_address
            )));
        }

        if !reward.is_attributed
            && self
                .repo
                .try_attribute_reward(reward_id, position_id, TimeMs::now())
                .await?
        {
            info!(reward_id, position_id = %position_id, reward_usd = %reward.reward_usd, "Reward attributed");
            return Ok(AttributionOutcome::Attributed);
        }

        // Lost the compare-and-set or it was attributed before: read the winner.
        let current = self.require_reward(reward_id).await?;
        match current.position_id {
            Some(ref owner) if owner == position_id => Ok(AttributionOutcome::AlreadyAttributed),
            Some(owner) => {
                warn!(
                    reward_id,
                    attributed_to = %owner,
                    requested = %position_id,
                    "Attribution conflict"
                );
                Err(LedgerError::Conflict {
                    reward_id,
                    attributed_to: owner,
                    requested: position_id.clone(),
                })
            }
            None => Err(LedgerError::IllegalState(format!(
                "reward {} is attributed without a position",
                reward_id
            ))),
        }
    }

    /// Attribute each id independently; one failure never aborts the rest.
    pub async fn batch_attribute(
        &self,
        reward_ids: &[i64],
        position_id: &PositionId,
    ) -> Vec<BatchAttributionItem> {
        let mut results = Vec::with_capacity(reward_ids.len());
        for &reward_id in reward_ids {
            let result = self.attribute(reward_id, position_id).await;
            if let Err(e) = &result {
                warn!(reward_id, position_id = %position_id, error = %e, "Batch attribution item failed");
            }
            results.push(BatchAttributionItem { reward_id, result });
        }
        results
    }

    async fn position_rewards(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<PositionReward>, LedgerError> {
        if self.repo.get_position(position_id).await?.is_none() {
            return Err(LedgerError::NotFound(format!("position {}", position_id)));
        }
        Ok(self.repo.list_position_rewards(position_id).await?)
    }

    pub async fn aggregate_by_token(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<RewardTokenTotal>, LedgerError> {
        Ok(aggregate_by_token(&self.position_rewards(position_id).await?))
    }

    pub async fn aggregate_by_month(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<RewardMonthTotal>, LedgerError> {
        aggregate_by_month(&self.position_rewards(position_id).await?)
    }

    /// Book a reward as income. At most one transaction exists per reward;
    /// any caller that does not create it gets `AlreadyConverted` with the
    /// existing transaction id.
    pub async fn create_transaction_from_reward(
        &self,
        reward_id: i64,
        account_id: Option<String>,
    ) -> Result<LedgerTransaction, LedgerError> {
        let reward = self.require_reward(reward_id).await?;
        if let Some(transaction_id) = reward.transaction_id {
            return Err(LedgerError::AlreadyConverted {
                reward_id,
                transaction_id,
            });
        }

        let transaction = LedgerTransaction {
            id: LedgerTransaction::new_id(),
            kind: TransactionKind::RewardIncome,
            account_id: account_id
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            position_id: reward.position_id.clone(),
            reward_id: Some(reward_id),
            amount_usd: reward.reward_usd,
            occurred_at: reward.claimed_at,
            tx_hash: reward.tx_hash.clone(),
            description: format!(
                "{} {} reward",
                reward.reward_amount, reward.reward_token_symbol
            ),
            created_at: TimeMs::now(),
        };

        if self.repo.insert_reward_transaction(&transaction).await? {
            info!(
                reward_id,
                transaction_id = %transaction.id,
                amount_usd = %transaction.amount_usd,
                "Reward converted to transaction"
            );
            return Ok(transaction);
        }

        let existing = self
            .repo
            .get_transaction_for_reward(reward_id)
            .await?
            .ok_or_else(|| {
                LedgerError::IllegalState(format!(
                    "reward {} conversion conflicted but no transaction exists",
                    reward_id
                ))
            })?;
        Err(LedgerError::AlreadyConverted {
            reward_id,
            transaction_id: existing.id,
        })
    }
}
