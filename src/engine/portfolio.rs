//! Wallet-wide aggregation over open and closed positions.

use super::roi::simple_roi_pct;
use super::{PositionFacts, PCT_DP};
use crate::domain::{Address, Decimal, ExchangeRates};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

/// USD totals converted to a display currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTotals {
    pub currency: String,
    pub current_value: Decimal,
    pub cost_basis: Decimal,
    pub total_rewards: Decimal,
    pub unrealized_pnl: Decimal,
    pub lifetime_realized_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub wallet: Address,
    pub open_positions: i64,
    pub closed_positions: i64,
    /// Open positions that count toward value but not toward cost or ROI.
    pub positions_missing_cost_basis: i64,
    pub current_value_usd: Decimal,
    pub cost_basis_usd: Decimal,
    pub total_rewards_usd: Decimal,
    pub unrealized_pnl_usd: Decimal,
    pub simple_roi_pct: Option<Decimal>,
    /// Frozen realized P&L of closed positions.
    pub lifetime_realized_pnl_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayTotals>,
}

impl PortfolioSummary {
    pub fn from_facts(wallet: Address, positions: &[PositionFacts]) -> Self {
        let mut summary = PortfolioSummary {
            wallet,
            open_positions: 0,
            closed_positions: 0,
            positions_missing_cost_basis: 0,
            current_value_usd: Decimal::zero(),
            cost_basis_usd: Decimal::zero(),
            total_rewards_usd: Decimal::zero(),
            unrealized_pnl_usd: Decimal::zero(),
            simple_roi_pct: None,
            lifetime_realized_pnl_usd: Decimal::zero(),
            display: None,
        };

        // Value and rewards of open positions that do have a cost basis.
        let mut priced_value = Decimal::zero();
        let mut priced_rewards = Decimal::zero();

        for facts in positions {
            if let Some(closure) = &facts.closure {
                summary.closed_positions += 1;
                if let Some(realized) = closure.realized_pnl_usd {
                    summary.lifetime_realized_pnl_usd += realized;
                }
                continue;
            }

            summary.open_positions += 1;
            let value = facts.current_value_usd();
            let rewards = facts.total_rewards_usd();
            summary.current_value_usd += value;
            summary.total_rewards_usd += rewards;

            match facts.cumulative_cost_basis() {
                Some(cost) => {
                    summary.cost_basis_usd += cost;
                    priced_value += value;
                    priced_rewards += rewards;
                }
                None => summary.positions_missing_cost_basis += 1,
            }
        }

        let has_priced = summary.open_positions > summary.positions_missing_cost_basis;
        if has_priced {
            summary.unrealized_pnl_usd = priced_value - summary.cost_basis_usd + priced_rewards;
            summary.simple_roi_pct = simple_roi_pct(summary.unrealized_pnl_usd, Some(summary.cost_basis_usd))
                .map(|p| p.round_dp(PCT_DP));
        }
        summary
    }

    /// Attach totals converted into `currency`.
    pub fn with_display_currency(
        mut self,
        rates: &ExchangeRates,
        currency: &str,
    ) -> Result<Self, LedgerError> {
        let convert = |amount: Decimal| {
            rates.from_usd(amount, currency).ok_or_else(|| {
                LedgerError::Validation(format!("no exchange rate for currency {}", currency))
            })
        };
        self.display = Some(DisplayTotals {
            currency: currency.trim().to_uppercase(),
            current_value: convert(self.current_value_usd)?,
            cost_basis: convert(self.cost_basis_usd)?,
            total_rewards: convert(self.total_rewards_usd)?,
            unrealized_pnl: convert(self.unrealized_pnl_usd)?,
            lifetime_realized_pnl: convert(self.lifetime_realized_pnl_usd)?,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PositionClosure, PositionId, ProtocolModule, TimeMs};
    use crate::engine::fixtures::{d, entry, facts, reward, snapshot};
    use std::collections::HashMap;

    fn open(id: &str, cost: Option<&str>, value: &str, rewards_usd: &str) -> PositionFacts {
        let mut f = facts(ProtocolModule::LiquidityPool);
        f.position.position_id = PositionId::new(id);
        if let Some(cost) = cost {
            f.cost_basis = vec![entry(1, cost, 0)];
        }
        f.latest_snapshot = Some(snapshot(value, 1, None));
        if rewards_usd != "0" {
            f.rewards = vec![reward(1, "OP", "1", rewards_usd, 0)];
        }
        f
    }

    fn closed(id: &str, realized: &str) -> PositionFacts {
        let mut f = open(id, Some("100"), "0", "0");
        f.closure = Some(PositionClosure {
            position_id: PositionId::new(id),
            exit_date: TimeMs::new(0),
            exit_value_usd: d("0"),
            destination_account_id: "acct".to_string(),
            tx_hash: None,
            cost_basis_usd: Some(d("100")),
            rewards_usd_at_close: d("0"),
            realized_pnl_usd: Some(d(realized)),
            realized_pnl_pct: None,
            transaction_id: "t".to_string(),
            closed_at: TimeMs::new(0),
        });
        f
    }

    #[test]
    fn test_portfolio_sums_open_positions_and_separates_realized() {
        let positions = vec![
            open("a", Some("1000"), "1100", "50"),
            open("b", Some("500"), "450", "0"),
            open("c", None, "300", "0"),
            closed("d", "-40"),
            closed("e", "90"),
        ];
        let summary = PortfolioSummary::from_facts(Address::new("0xabc".to_string()), &positions);

        assert_eq!(summary.open_positions, 3);
        assert_eq!(summary.closed_positions, 2);
        assert_eq!(summary.positions_missing_cost_basis, 1);
        assert_eq!(summary.current_value_usd, d("1850"));
        assert_eq!(summary.cost_basis_usd, d("1500"));
        assert_eq!(summary.total_rewards_usd, d("50"));
        assert_eq!(summary.unrealized_pnl_usd, d("100"));
        assert_eq!(summary.simple_roi_pct.unwrap().round_dp(4), d("6.6667"));
        assert_eq!(summary.lifetime_realized_pnl_usd, d("50"));
    }

    #[test]
    fn test_portfolio_without_cost_basis_has_unknown_roi() {
        let positions = vec![open("c", None, "300", "0")];
        let summary = PortfolioSummary::from_facts(Address::new("0xabc".to_string()), &positions);
        assert_eq!(summary.simple_roi_pct, None);
        assert_eq!(summary.current_value_usd, d("300"));
    }

    #[test]
    fn test_display_currency_conversion() {
        let positions = vec![open("a", Some("1000"), "1100", "0")];
        let rates = ExchangeRates::new(HashMap::from([("EUR".to_string(), d("1.25"))]));
        let summary = PortfolioSummary::from_facts(Address::new("0xabc".to_string()), &positions)
            .with_display_currency(&rates, "eur")
            .unwrap();
        let display = summary.display.unwrap();
        assert_eq!(display.currency, "EUR");
        assert_eq!(display.current_value, d("880"));
        assert_eq!(display.unrealized_pnl, d("80"));

        let err = PortfolioSummary::from_facts(Address::new("0xabc".to_string()), &positions)
            .with_display_currency(&rates, "JPY")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
