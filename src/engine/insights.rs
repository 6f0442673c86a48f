//! Human-readable flags derived from a position's performance.

use super::roi::PositionPerformance;
use crate::domain::PositionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    MissingCostBasis,
    MissingTokenSplit,
    LowConfidenceAnnualization,
    LpOutperformedHodl,
    IlExceedsYield,
    PostCloseRewards,
}

impl Insight {
    pub fn message(&self) -> &'static str {
        match self {
            Insight::MissingCostBasis => {
                "No cost basis recorded; P&L and ROI cannot be computed."
            }
            Insight::MissingTokenSplit => {
                "Cost basis has no token amounts; HODL comparison is unavailable."
            }
            Insight::LowConfidenceAnnualization => {
                "Annualized ROI extrapolates from less than a week of history."
            }
            Insight::LpOutperformedHodl => "Providing liquidity beat holding the tokens.",
            Insight::IlExceedsYield => {
                "Impermanent loss is larger than the yield the position earned."
            }
            Insight::PostCloseRewards => {
                "Rewards were attributed after the position was closed."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightItem {
    pub insight: Insight,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInsights {
    pub position_id: PositionId,
    pub insights: Vec<InsightItem>,
}

impl PositionInsights {
    pub fn from_performance(perf: &PositionPerformance) -> Self {
        let mut flags = Vec::new();

        if perf.roi.cost_basis_usd.is_none() {
            flags.push(Insight::MissingCostBasis);
        } else if perf.hodl_value_usd.is_none() {
            flags.push(Insight::MissingTokenSplit);
        }
        if perf.roi.annualized_low_confidence {
            flags.push(Insight::LowConfidenceAnnualization);
        }
        if perf.lp_outperformed_hodl == Some(true) {
            flags.push(Insight::LpOutperformedHodl);
        }
        if let (Some(il_usd), Some(yield_usd)) = (perf.il_usd, perf.estimated_yield_usd) {
            if il_usd.abs() > yield_usd {
                flags.push(Insight::IlExceedsYield);
            }
        }
        if perf.roi.post_close_rewards_usd.is_positive() {
            flags.push(Insight::PostCloseRewards);
        }

        PositionInsights {
            position_id: perf.roi.position_id.clone(),
            insights: flags
                .into_iter()
                .map(|insight| InsightItem {
                    insight,
                    message: insight.message().to_string(),
                })
                .collect(),
        }
    }
}
