//! Reward aggregation per token and per calendar month.

use crate::domain::{Decimal, PositionReward};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTokenTotal {
    pub symbol: String,
    pub amount: Decimal,
    pub usd: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardMonthTotal {
    /// `YYYY-MM`, UTC calendar month of `claimed_at`.
    pub month: String,
    pub usd: Decimal,
    pub count: i64,
}

pub fn total_usd(rewards: &[PositionReward]) -> Decimal {
    rewards.iter().map(|r| r.reward_usd).sum()
}

/// Sum `reward_amount` and `reward_usd` per token, largest USD total first.
pub fn aggregate_by_token(rewards: &[PositionReward]) -> Vec<RewardTokenTotal> {
    let mut groups: BTreeMap<&str, RewardTokenTotal> = BTreeMap::new();
    for reward in rewards {
        let entry = groups
            .entry(reward.reward_token_symbol.as_str())
            .or_insert_with(|| RewardTokenTotal {
                symbol: reward.reward_token_symbol.clone(),
                amount: Decimal::zero(),
                usd: Decimal::zero(),
                count: 0,
            });
        entry.amount += reward.reward_amount;
        entry.usd += reward.reward_usd;
        entry.count += 1;
    }

    let mut totals: Vec<RewardTokenTotal> = groups.into_values().collect();
    totals.sort_by(|a, b| b.usd.cmp(&a.usd).then_with(|| a.symbol.cmp(&b.symbol)));
    totals
}

/// Sum `reward_usd` per UTC calendar month of `claimed_at`, oldest first.
pub fn aggregate_by_month(rewards: &[PositionReward]) -> Result<Vec<RewardMonthTotal>, LedgerError> {
    let mut groups: BTreeMap<String, RewardMonthTotal> = BTreeMap::new();
    for reward in rewards {
        let month = reward.claimed_at.month_key().ok_or_else(|| {
            LedgerError::IllegalState(format!(
                "reward {} has an unrepresentable claim time {}ms",
                reward.id,
                reward.claimed_at.as_ms()
            ))
        })?;
        let entry = groups
            .entry(month.clone())
            .or_insert_with(|| RewardMonthTotal {
                month,
                usd: Decimal::zero(),
                count: 0,
            });
        entry.usd += reward.reward_usd;
        entry.count += 1;
    }
    Ok(groups.into_values().collect())
}
