//! Pure computation engine(s) for position analytics.
//!
//! Every function here is a synchronous function of already-persisted ledger
//! state plus caller-supplied prices. Nothing is cached or written back.

use crate::domain::{
    CostBasisEntry, Decimal, Position, PositionClosure, PositionReward, PositionSnapshot, TimeMs,
};

pub mod cost_basis;
pub mod impermanent_loss;
pub mod insights;
pub mod pnl;
pub mod portfolio;
pub mod rewards;
pub mod roi;
pub mod scenarios;

pub use cost_basis::{cumulative_cost_basis, earliest_deposit, entry_composition, EntryLeg};
pub use impermanent_loss::{compare_lp_to_hodl, impermanent_loss_pct, LpVsHodl, PriceBook};
pub use insights::{Insight, PositionInsights};
pub use pnl::PositionPnl;
pub use portfolio::PortfolioSummary;
pub use rewards::{RewardMonthTotal, RewardTokenTotal};
pub use roi::{annualized_roi_pct, days_held, simple_roi_pct, PositionPerformance, PositionRoi};
pub use scenarios::{HodlScenario, HodlScenariosResponse, ScenarioKind};

/// Decimal places kept on percentage outputs.
pub const PCT_DP: u32 = 8;

/// Everything the ledger knows about one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionFacts {
    pub position: Position,
    pub cost_basis: Vec<CostBasisEntry>,
    pub latest_snapshot: Option<PositionSnapshot>,
    /// Rewards attributed to this position.
    pub rewards: Vec<PositionReward>,
    pub closure: Option<PositionClosure>,
}

impl PositionFacts {
    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub fn cumulative_cost_basis(&self) -> Option<Decimal> {
        cumulative_cost_basis(&self.cost_basis)
    }

    pub fn total_rewards_usd(&self) -> Decimal {
        rewards::total_usd(&self.rewards)
    }

    /// Live value of an open position: the latest snapshot, falling back to
    /// the balance reported by the last sync.
    pub fn current_value_usd(&self) -> Decimal {
        self.latest_snapshot
            .as_ref()
            .map(|s| s.balance_usd)
            .unwrap_or(self.position.balance_usd)
    }

    /// When `current_value_usd` was observed.
    pub fn current_value_observed_at(&self) -> TimeMs {
        self.latest_snapshot
            .as_ref()
            .map(|s| s.snapshot_date)
            .unwrap_or(self.position.updated_at)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::{Address, PositionId, ProtocolModule, RewardSource, TokenLeg};

    pub const DAY_MS: i64 = 86_400_000;

    pub fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    pub fn position(module: ProtocolModule) -> Position {
        Position {
            position_id: PositionId::new("0xabc:1:uniswap:0xpool"),
            wallet_address: Address::new("0xabc".to_string()),
            chain_id: "1".to_string(),
            protocol: "uniswap".to_string(),
            protocol_module: module,
            token_name: None,
            token_symbol: None,
            balance: d("1"),
            balance_usd: d("0"),
            price_usd: d("0"),
            logo_url: None,
            updated_at: TimeMs::new(0),
        }
    }

    pub fn leg(symbol: &str, amount: &str, price: Option<&str>) -> TokenLeg {
        TokenLeg {
            symbol: symbol.to_string(),
            amount: d(amount),
            price_usd: price.map(d),
        }
    }

    pub fn entry(id: i64, total: &str, deposited_day: i64) -> CostBasisEntry {
        CostBasisEntry {
            id,
            position_id: PositionId::new("0xabc:1:uniswap:0xpool"),
            total_usd: d(total),
            token_a: None,
            token_b: None,
            deposited_at: TimeMs::new(deposited_day * DAY_MS),
            tx_hash: None,
            vault_address: None,
            reverses_entry_id: None,
            recorded_at: TimeMs::new(deposited_day * DAY_MS),
        }
    }

    pub fn snapshot(balance_usd: &str, day: i64, apy: Option<&str>) -> PositionSnapshot {
        PositionSnapshot {
            id: day,
            position_id: PositionId::new("0xabc:1:uniswap:0xpool"),
            balance: d("1"),
            balance_usd: d(balance_usd),
            price_usd: d("1"),
            protocol_apy: apy.map(d),
            snapshot_date: TimeMs::new(day * DAY_MS),
        }
    }

    pub fn reward(id: i64, symbol: &str, amount: &str, usd: &str, claimed_ms: i64) -> PositionReward {
        PositionReward {
            id,
            event_key: format!("ev:{}", id),
            wallet_address: Address::new("0xabc".to_string()),
            chain_id: "1".to_string(),
            token_address: format!("0x{}", symbol.to_lowercase()),
            reward_token_symbol: symbol.to_string(),
            reward_amount: d(amount),
            reward_usd: d(usd),
            claimed_at: TimeMs::new(claimed_ms),
            tx_hash: None,
            source: RewardSource::Direct,
            is_attributed: true,
            position_id: Some(PositionId::new("0xabc:1:uniswap:0xpool")),
            transaction_id: None,
        }
    }

    pub fn facts(module: ProtocolModule) -> PositionFacts {
        PositionFacts {
            position: position(module),
            cost_basis: Vec::new(),
            latest_snapshot: None,
            rewards: Vec::new(),
            closure: None,
        }
    }
}
