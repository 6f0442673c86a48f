//! "What if I had just held" scenarios.

use super::impermanent_loss::PriceBook;
use super::roi::{days_held, lp_value_usd};
use super::{earliest_deposit, entry_composition, EntryLeg, PositionFacts, PCT_DP};
use crate::domain::{Decimal, TimeMs};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// All initial capital held in one token.
    HoldToken,
    /// Initial capital split evenly between both tokens and held.
    BalancedSplit,
    /// What the position is actually worth, rewards included.
    ActualPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HodlScenario {
    pub name: String,
    pub kind: ScenarioKind,
    pub value_usd: Decimal,
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HodlScenariosResponse {
    pub initial_date: TimeMs,
    pub days_held: i64,
    pub initial_value_usd: Decimal,
    /// Ranked by `value_usd`, highest first.
    pub scenarios: Vec<HodlScenario>,
    pub winner: String,
    pub winner_vs_lp_usd: Decimal,
}

/// Build and rank the HODL scenarios of a position.
///
/// The initial capital is the cumulative cost basis; each hold scenario buys
/// the token(s) at their entry price and values them at the current quote.
pub fn hodl_scenarios(
    facts: &PositionFacts,
    prices: &PriceBook,
) -> Result<HodlScenariosResponse, LedgerError> {
    let initial_value = facts
        .cumulative_cost_basis()
        .filter(|c| c.is_positive())
        .ok_or_else(|| {
            LedgerError::Validation(format!(
                "position {} has no positive cost basis",
                facts.position.position_id
            ))
        })?;
    let initial_date = earliest_deposit(&facts.cost_basis).ok_or_else(|| {
        LedgerError::Validation(format!(
            "position {} has no active cost basis entry",
            facts.position.position_id
        ))
    })?;
    let legs = entry_composition(&facts.cost_basis)?.ok_or_else(|| {
        LedgerError::Validation(format!(
            "cost basis of {} lacks token amounts; HODL baseline unavailable",
            facts.position.position_id
        ))
    })?;

    let two_token = facts.position.protocol_module.supports_two_token_pool() && legs.len() == 2;
    let legs: Vec<EntryLeg> = if two_token {
        legs
    } else {
        legs.into_iter().take(1).collect()
    };

    let scenario = |name: String, kind: ScenarioKind, value: Decimal| HodlScenario {
        name,
        kind,
        return_pct: (value - initial_value)
            .percent_of(initial_value)
            .unwrap_or_default()
            .round_dp(PCT_DP),
        value_usd: value,
    };

    let mut scenarios = Vec::with_capacity(4);
    let mut split_value = Decimal::zero();
    let half = initial_value / Decimal::from_i64(2);
    for leg in &legs {
        let growth = price_growth(leg, prices)?;
        scenarios.push(scenario(
            format!("hold_{}", leg.symbol),
            ScenarioKind::HoldToken,
            initial_value * growth,
        ));
        split_value += half * growth;
    }
    if two_token {
        scenarios.push(scenario(
            "hodl_50_50".to_string(),
            ScenarioKind::BalancedSplit,
            split_value,
        ));
    }

    let actual_name = if two_token { "lp_position" } else { "actual_position" };
    let actual_value = lp_value_usd(facts, prices)? + facts.total_rewards_usd();
    scenarios.push(scenario(
        actual_name.to_string(),
        ScenarioKind::ActualPosition,
        actual_value,
    ));

    scenarios.sort_by(|a, b| b.value_usd.cmp(&a.value_usd).then_with(|| a.name.cmp(&b.name)));
    let winner = &scenarios[0];

    let end = facts
        .closure
        .as_ref()
        .map(|c| c.exit_date)
        .unwrap_or_else(|| prices.valued_at());

    Ok(HodlScenariosResponse {
        initial_date,
        days_held: days_held(initial_date, end),
        initial_value_usd: initial_value,
        winner: winner.name.clone(),
        winner_vs_lp_usd: winner.value_usd - actual_value,
        scenarios,
    })
}

/// Current price over entry price for one leg.
fn price_growth(leg: &EntryLeg, prices: &PriceBook) -> Result<Decimal, LedgerError> {
    if !leg.entry_price_usd.is_positive() {
        return Err(LedgerError::IllegalState(format!(
            "entry price of {} must be positive, got {}",
            leg.symbol, leg.entry_price_usd
        )));
    }
    Ok(prices.price(&leg.symbol)? / leg.entry_price_usd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceQuote, ProtocolModule};
    use crate::engine::fixtures::{d, entry, facts, leg, reward, snapshot, DAY_MS};

    fn prices(now: TimeMs, quotes: &[(&str, &str)]) -> PriceBook {
        PriceBook::new(
            quotes
                .iter()
                .map(|(s, p)| PriceQuote {
                    symbol: s.to_string(),
                    price_usd: d(p),
                    as_of: now,
                })
                .collect(),
            now,
            3600,
        )
    }

    fn eth_usdc_facts() -> PositionFacts {
        let mut f = facts(ProtocolModule::LiquidityPool);
        let mut e = entry(1, "4000", 0);
        e.token_a = Some(leg("ETH", "1", Some("2000")));
        e.token_b = Some(leg("USDC", "2000", Some("1")));
        f.cost_basis = vec![e];
        f.latest_snapshot = Some(snapshot("5800", 60, None));
        f
    }

    #[test]
    fn test_two_token_scenarios_ranked() {
        let now = TimeMs::new(60 * DAY_MS);
        let f = eth_usdc_facts();
        let resp = hodl_scenarios(&f, &prices(now, &[("ETH", "4000"), ("USDC", "1")])).unwrap();

        let names: Vec<&str> = resp.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["hold_ETH", "hodl_50_50", "lp_position", "hold_USDC"]);
        assert_eq!(resp.scenarios[0].value_usd, d("8000"));
        assert_eq!(resp.scenarios[0].return_pct, d("100"));
        assert_eq!(resp.scenarios[1].value_usd, d("6000"));
        assert_eq!(resp.scenarios[3].return_pct, Decimal::zero());
        assert_eq!(resp.winner, "hold_ETH");
        assert_eq!(resp.winner_vs_lp_usd, d("2200"));
        assert_eq!(resp.days_held, 60);
        assert_eq!(resp.initial_value_usd, d("4000"));
    }

    #[test]
    fn test_rewards_count_toward_actual_position() {
        let now = TimeMs::new(60 * DAY_MS);
        let mut f = eth_usdc_facts();
        f.rewards = vec![reward(1, "OP", "100", "2500", 0)];
        let resp = hodl_scenarios(&f, &prices(now, &[("ETH", "4000"), ("USDC", "1")])).unwrap();
        assert_eq!(resp.winner, "lp_position");
        assert_eq!(resp.winner_vs_lp_usd, Decimal::zero());
    }

    #[test]
    fn test_single_asset_position_compares_hold_vs_actual() {
        let now = TimeMs::new(10 * DAY_MS);
        let mut f = facts(ProtocolModule::Staking);
        let mut e = entry(1, "2000", 0);
        e.token_a = Some(leg("ETH", "1", None));
        f.cost_basis = vec![e];
        f.latest_snapshot = Some(snapshot("2300", 10, None));

        let resp = hodl_scenarios(&f, &prices(now, &[("ETH", "2200")])).unwrap();
        assert_eq!(resp.scenarios.len(), 2);
        assert_eq!(resp.winner, "actual_position");
        assert_eq!(resp.scenarios[1].name, "hold_ETH");
        assert_eq!(resp.scenarios[1].value_usd, d("2200"));
        assert_eq!(resp.winner_vs_lp_usd, Decimal::zero());
    }

    #[test]
    fn test_missing_cost_basis_rejected() {
        let f = facts(ProtocolModule::LiquidityPool);
        let err = hodl_scenarios(&f, &prices(TimeMs::new(0), &[])).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
