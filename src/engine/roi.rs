//! Return on investment, annualization and the per-position ROI/performance
//! views.

use super::impermanent_loss::{compare_lp_to_hodl, PriceBook};
use super::pnl::PositionPnl;
use super::rewards::{aggregate_by_month, aggregate_by_token};
use super::{earliest_deposit, entry_composition, PositionFacts, RewardMonthTotal, RewardTokenTotal, PCT_DP};
use crate::domain::{Decimal, PositionId, TimeMs};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

/// Held days between `start` and `end`, never less than one.
pub fn days_held(start: TimeMs, end: TimeMs) -> i64 {
    end.whole_days_since(start).max(1)
}

/// `total_return / cost_basis * 100`; unknown for a missing or zero basis.
pub fn simple_roi_pct(total_return_usd: Decimal, cost_basis: Option<Decimal>) -> Option<Decimal> {
    cost_basis
        .filter(|c| c.is_positive())
        .and_then(|c| total_return_usd.percent_of(c))
}

/// Compound a holding-period return to a 365-day rate:
/// `((1 + roi/100) ^ (365/days) - 1) * 100`.
///
/// `None` when `days_held < 1` or when the result is not representable
/// (extreme extrapolation of a short holding period).
pub fn annualized_roi_pct(simple_roi_pct: Decimal, days_held: i64) -> Option<Decimal> {
    if days_held < 1 {
        return None;
    }
    let growth = Decimal::one().checked_add(simple_roi_pct / Decimal::hundred())?;
    if growth.is_negative() {
        return None;
    }
    if growth.is_zero() {
        return Some(-Decimal::hundred());
    }

    let exponent = Decimal::from_i64(365).checked_div(Decimal::from_i64(days_held))?;
    let compounded = growth.checked_powd(exponent)?;
    compounded
        .checked_sub(Decimal::one())?
        .checked_mul(Decimal::hundred())
        .map(|pct| pct.round_dp(PCT_DP))
}

/// ROI view of a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRoi {
    pub position_id: PositionId,
    pub is_closed: bool,
    pub current_value_usd: Decimal,
    pub cost_basis_usd: Option<Decimal>,
    pub total_rewards_usd: Decimal,
    pub rewards_count: i64,
    pub rewards_by_token: Vec<RewardTokenTotal>,
    pub rewards_by_month: Vec<RewardMonthTotal>,
    pub total_return_usd: Option<Decimal>,
    pub simple_roi_pct: Option<Decimal>,
    pub annualized_roi_pct: Option<Decimal>,
    /// Set when the annualized figure extrapolates from a very short hold.
    pub annualized_low_confidence: bool,
    pub days_held: Option<i64>,
    /// Protocol-reported APY from the latest snapshot.
    pub current_apy: Option<Decimal>,
    pub post_close_rewards_usd: Decimal,
}

impl PositionRoi {
    /// Build the ROI view. `as_of` ends the holding period for open positions
    /// that have no snapshot yet.
    pub fn from_facts(
        facts: &PositionFacts,
        as_of: TimeMs,
        low_confidence_days: i64,
    ) -> Result<Self, LedgerError> {
        let pnl = PositionPnl::from_facts(facts);
        let total_return = if pnl.is_closed {
            pnl.realized_pnl_usd
        } else {
            pnl.unrealized_pnl_usd
        };

        let end = match (&facts.closure, &facts.latest_snapshot) {
            (Some(closure), _) => closure.exit_date,
            (None, Some(snapshot)) => snapshot.snapshot_date,
            (None, None) => as_of,
        };
        let days = earliest_deposit(&facts.cost_basis).map(|start| days_held(start, end));

        let simple = total_return.and_then(|r| simple_roi_pct(r, pnl.cost_basis_usd));
        let annualized = match (simple, days) {
            (Some(roi), Some(days)) => annualized_roi_pct(roi, days),
            _ => None,
        };
        if simple.is_some() && annualized.is_none() {
            tracing::debug!(
                position_id = %facts.position.position_id,
                simple_roi = ?simple,
                days = ?days,
                "Annualized ROI not representable"
            );
        }
        // Short holds are flagged even when the extrapolation is not representable.
        let low_confidence = simple.is_some() && days.is_some_and(|d| d < low_confidence_days);

        Ok(PositionRoi {
            position_id: facts.position.position_id.clone(),
            is_closed: pnl.is_closed,
            current_value_usd: pnl.current_value_usd,
            cost_basis_usd: pnl.cost_basis_usd,
            total_rewards_usd: pnl.total_rewards_usd,
            rewards_count: facts.rewards.len() as i64,
            rewards_by_token: aggregate_by_token(&facts.rewards),
            rewards_by_month: aggregate_by_month(&facts.rewards)?,
            total_return_usd: total_return,
            simple_roi_pct: simple.map(|p| p.round_dp(PCT_DP)),
            annualized_roi_pct: annualized,
            annualized_low_confidence: low_confidence,
            days_held: days,
            current_apy: facts.latest_snapshot.as_ref().and_then(|s| s.protocol_apy),
            post_close_rewards_usd: pnl.post_close_rewards_usd,
        })
    }
}

/// ROI plus the LP-versus-HODL comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPerformance {
    #[serde(flatten)]
    pub roi: PositionRoi,
    pub price_ratio: Option<Decimal>,
    pub il_percentage: Option<Decimal>,
    pub il_usd: Option<Decimal>,
    pub hodl_value_usd: Option<Decimal>,
    pub lp_vs_hodl_usd: Option<Decimal>,
    pub lp_outperformed_hodl: Option<bool>,
    /// LP value not explained by price divergence (fees): `lp_vs_hodl - il_usd`.
    pub estimated_yield_usd: Option<Decimal>,
    pub estimated_yield_pct: Option<Decimal>,
}

impl PositionPerformance {
    /// `prices` must be valued at the exit date for closed positions and at
    /// "now" for open ones; the LP value's own observation time is checked
    /// against the same tolerance.
    pub fn from_facts(
        facts: &PositionFacts,
        prices: &PriceBook,
        low_confidence_days: i64,
    ) -> Result<Self, LedgerError> {
        let roi = PositionRoi::from_facts(facts, prices.valued_at(), low_confidence_days)?;

        let legs = entry_composition(&facts.cost_basis)?;
        let comparison = match legs {
            Some(legs) => {
                let legs = if facts.position.protocol_module.supports_two_token_pool() {
                    legs
                } else {
                    // Single-asset modules never take IL; compare the primary leg only.
                    legs.into_iter().take(1).collect()
                };
                let lp_value = lp_value_usd(facts, prices)?;
                Some(compare_lp_to_hodl(&legs, prices, lp_value)?)
            }
            None => None,
        };

        let estimated_yield = comparison.as_ref().map(|c| match c.il_usd {
            Some(il_usd) => c.lp_vs_hodl_usd - il_usd,
            None => c.lp_vs_hodl_usd,
        });
        let estimated_yield_pct = estimated_yield
            .zip(roi.cost_basis_usd.filter(|c| c.is_positive()))
            .and_then(|(y, c)| y.percent_of(c))
            .map(|p| p.round_dp(PCT_DP));

        Ok(PositionPerformance {
            price_ratio: comparison.as_ref().and_then(|c| c.price_ratio),
            il_percentage: comparison.as_ref().and_then(|c| c.il_percentage),
            il_usd: comparison.as_ref().and_then(|c| c.il_usd),
            hodl_value_usd: comparison.as_ref().map(|c| c.hodl_value_usd),
            lp_vs_hodl_usd: comparison.as_ref().map(|c| c.lp_vs_hodl_usd),
            lp_outperformed_hodl: comparison.as_ref().map(|c| c.lp_outperformed_hodl),
            estimated_yield_usd: estimated_yield,
            estimated_yield_pct,
            roi,
        })
    }
}

/// Position value used as the "actual" side of LP-versus-HODL comparisons.
pub(crate) fn lp_value_usd(facts: &PositionFacts, prices: &PriceBook) -> Result<Decimal, LedgerError> {
    match &facts.closure {
        Some(closure) => Ok(closure.exit_value_usd),
        None => {
            prices.check_fresh(
                &format!("position {}", facts.position.position_id),
                facts.current_value_observed_at(),
            )?;
            Ok(facts.current_value_usd())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceQuote, ProtocolModule};
    use crate::engine::fixtures::{d, entry, facts, leg, reward, snapshot, DAY_MS};

    #[test]
    fn test_days_held_minimum_one() {
        assert_eq!(days_held(TimeMs::new(0), TimeMs::new(0)), 1);
        assert_eq!(days_held(TimeMs::new(0), TimeMs::new(DAY_MS / 2)), 1);
        assert_eq!(days_held(TimeMs::new(0), TimeMs::new(DAY_MS * 30)), 30);
    }

    #[test]
    fn test_simple_roi_unknown_for_zero_or_missing_basis() {
        assert_eq!(simple_roi_pct(d("10"), None), None);
        assert_eq!(simple_roi_pct(d("10"), Some(Decimal::zero())), None);
        assert_eq!(simple_roi_pct(d("10"), Some(d("200"))), Some(d("5")));
    }

    #[test]
    fn test_annualized_full_year_equals_simple() {
        assert_eq!(annualized_roi_pct(d("12"), 365), Some(d("12")));
    }

    #[test]
    fn test_annualized_half_year_compounds() {
        // 1.1 ^ (365/730) = 1.1 ^ 0.5
        let annual = annualized_roi_pct(d("10"), 730).unwrap();
        assert_eq!(annual.round_dp(4), d("4.8809"));
    }

    #[test]
    fn test_annualized_monotonically_non_increasing_in_days() {
        for simple in ["0.5", "5", "45", "100", "300"] {
            let mut previous: Option<Decimal> = None;
            for days in 1..=400 {
                if let Some(current) = annualized_roi_pct(d(simple), days) {
                    if let Some(prev) = previous {
                        assert!(
                            current <= prev,
                            "roi {} day {}: {} > {}",
                            simple,
                            days,
                            current,
                            prev
                        );
                    }
                    previous = Some(current);
                }
            }
            assert!(previous.is_some(), "roi {} never annualized", simple);
        }
    }

    #[test]
    fn test_annualized_unrepresentable_extrapolation_is_none() {
        // 2 ^ 91.25 and 4 ^ 45.625 fit in a decimal, the percentage does not.
        assert_eq!(annualized_roi_pct(d("100"), 4), None);
        assert_eq!(annualized_roi_pct(d("300"), 8), None);
        assert!(annualized_roi_pct(d("300"), 365).is_some());
    }

    #[test]
    fn test_annualized_total_loss() {
        assert_eq!(annualized_roi_pct(d("-100"), 10), Some(d("-100")));
        assert_eq!(annualized_roi_pct(d("-150"), 10), None);
        assert_eq!(annualized_roi_pct(d("10"), 0), None);
    }

    #[test]
    fn test_roi_from_facts_open_position() {
        let mut f = facts(ProtocolModule::Staking);
        f.cost_basis = vec![entry(1, "1000", 0)];
        f.latest_snapshot = Some(snapshot("1050", 3, Some("4.2")));
        f.rewards = vec![reward(1, "OP", "1", "10", 0)];

        let roi = PositionRoi::from_facts(&f, TimeMs::new(10 * DAY_MS), 7).unwrap();
        assert_eq!(roi.total_return_usd, Some(d("60")));
        assert_eq!(roi.simple_roi_pct, Some(d("6")));
        assert_eq!(roi.days_held, Some(3));
        assert!(roi.annualized_roi_pct.is_some());
        assert!(roi.annualized_low_confidence);
        assert_eq!(roi.current_apy, Some(d("4.2")));
        assert_eq!(roi.rewards_count, 1);
    }

    #[test]
    fn test_roi_short_hold_flagged_when_annualized_overflows() {
        let mut f = facts(ProtocolModule::Staking);
        f.cost_basis = vec![entry(1, "1000", 0)];
        f.latest_snapshot = Some(snapshot("2000", 4, None));

        let roi = PositionRoi::from_facts(&f, TimeMs::new(4 * DAY_MS), 7).unwrap();
        assert_eq!(roi.simple_roi_pct, Some(d("100")));
        assert_eq!(roi.days_held, Some(4));
        assert_eq!(roi.annualized_roi_pct, None);
        assert!(roi.annualized_low_confidence);
    }

    #[test]
    fn test_roi_without_cost_basis_is_unknown() {
        let mut f = facts(ProtocolModule::Vault);
        f.latest_snapshot = Some(snapshot("1050", 3, None));
        let roi = PositionRoi::from_facts(&f, TimeMs::new(0), 7).unwrap();
        assert_eq!(roi.simple_roi_pct, None);
        assert_eq!(roi.annualized_roi_pct, None);
        assert_eq!(roi.days_held, None);
        assert!(!roi.annualized_low_confidence);
        assert_eq!(roi.current_apy, None);
    }

    #[test]
    fn test_performance_for_lp_position() {
        let mut f = facts(ProtocolModule::LiquidityPool);
        let mut e = entry(1, "4000", 0);
        e.token_a = Some(leg("ETH", "1", Some("2000")));
        e.token_b = Some(leg("USDC", "2000", Some("1")));
        f.cost_basis = vec![e];
        f.latest_snapshot = Some(snapshot("5800", 30, None));

        let now = TimeMs::new(30 * DAY_MS);
        let prices = PriceBook::new(
            vec![
                PriceQuote { symbol: "ETH".into(), price_usd: d("4000"), as_of: now },
                PriceQuote { symbol: "USDC".into(), price_usd: d("1"), as_of: now },
            ],
            now,
            3600,
        );
        let perf = PositionPerformance::from_facts(&f, &prices, 7).unwrap();
        assert_eq!(perf.hodl_value_usd, Some(d("6000")));
        assert_eq!(perf.lp_vs_hodl_usd, Some(d("-200")));
        assert_eq!(perf.lp_outperformed_hodl, Some(false));
        assert_eq!(perf.il_percentage.unwrap().round_dp(2), d("-5.72"));
        assert_eq!(perf.estimated_yield_usd.unwrap().round_dp(2), d("143.15"));
        assert_eq!(perf.roi.simple_roi_pct, Some(d("45")));
    }

    #[test]
    fn test_performance_rejects_stale_snapshot() {
        let mut f = facts(ProtocolModule::Staking);
        let mut e = entry(1, "2000", 0);
        e.token_a = Some(leg("ETH", "1", None));
        f.cost_basis = vec![e];
        f.latest_snapshot = Some(snapshot("2100", 1, None));

        let now = TimeMs::new(5 * DAY_MS);
        let prices = PriceBook::new(
            vec![PriceQuote { symbol: "ETH".into(), price_usd: d("2100"), as_of: now }],
            now,
            3600,
        );
        assert!(matches!(
            PositionPerformance::from_facts(&f, &prices, 7),
            Err(LedgerError::StalePrice { .. })
        ));
    }

    #[test]
    fn test_performance_without_token_split_has_no_hodl() {
        let mut f = facts(ProtocolModule::LiquidityPool);
        f.cost_basis = vec![entry(1, "1000", 0)];
        f.latest_snapshot = Some(snapshot("1100", 2, None));
        let prices = PriceBook::new(vec![], TimeMs::new(2 * DAY_MS), 3600);

        let perf = PositionPerformance::from_facts(&f, &prices, 7).unwrap();
        assert_eq!(perf.hodl_value_usd, None);
        assert_eq!(perf.il_percentage, None);
        assert_eq!(perf.roi.simple_roi_pct, Some(d("10")));
    }
}
