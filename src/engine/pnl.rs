//! Realized and unrealized profit-and-loss.

use super::{PositionFacts, PCT_DP};
use crate::domain::{Decimal, PositionId};
use serde::{Deserialize, Serialize};

/// `value - cost_basis + rewards`; unknown when no cost basis is recorded.
pub fn pnl_usd(value_usd: Decimal, cost_basis: Option<Decimal>, rewards_usd: Decimal) -> Option<Decimal> {
    cost_basis.map(|cost| value_usd - cost + rewards_usd)
}

/// P&L as a percentage of cost basis; unknown for a missing or zero basis.
pub fn pnl_pct(pnl_usd: Option<Decimal>, cost_basis: Option<Decimal>) -> Option<Decimal> {
    match (pnl_usd, cost_basis) {
        (Some(pnl), Some(cost)) => pnl.percent_of(cost).map(|p| p.round_dp(PCT_DP)),
        _ => None,
    }
}

/// P&L view of a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPnl {
    pub position_id: PositionId,
    pub is_closed: bool,
    pub current_value_usd: Decimal,
    pub cost_basis_usd: Option<Decimal>,
    pub total_rewards_usd: Decimal,
    pub unrealized_pnl_usd: Option<Decimal>,
    pub unrealized_pnl_pct: Option<Decimal>,
    pub realized_pnl_usd: Option<Decimal>,
    pub realized_pnl_pct: Option<Decimal>,
    /// Rewards attributed after the closure froze `realized_pnl_usd`.
    pub post_close_rewards_usd: Decimal,
}

impl PositionPnl {
    pub fn from_facts(facts: &PositionFacts) -> Self {
        let cost_basis = facts.cumulative_cost_basis();
        let rewards = facts.total_rewards_usd();

        match &facts.closure {
            Some(closure) => PositionPnl {
                position_id: facts.position.position_id.clone(),
                is_closed: true,
                current_value_usd: closure.exit_value_usd,
                cost_basis_usd: closure.cost_basis_usd,
                total_rewards_usd: rewards,
                unrealized_pnl_usd: None,
                unrealized_pnl_pct: None,
                realized_pnl_usd: closure.realized_pnl_usd,
                realized_pnl_pct: closure.realized_pnl_pct,
                post_close_rewards_usd: rewards - closure.rewards_usd_at_close,
            },
            None => {
                let current_value = facts.current_value_usd();
                let unrealized = pnl_usd(current_value, cost_basis, rewards);
                PositionPnl {
                    position_id: facts.position.position_id.clone(),
                    is_closed: false,
                    current_value_usd: current_value,
                    cost_basis_usd: cost_basis,
                    total_rewards_usd: rewards,
                    unrealized_pnl_usd: unrealized,
                    unrealized_pnl_pct: pnl_pct(unrealized, cost_basis),
                    realized_pnl_usd: None,
                    realized_pnl_pct: None,
                    post_close_rewards_usd: Decimal::zero(),
                }
            }
        }
    }
}
