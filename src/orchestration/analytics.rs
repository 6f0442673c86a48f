//! Loads ledger facts and runs the engine views over them.
//!
//! Nothing computed here is persisted; every call recomputes from the ledger.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, Position, PositionId, PriceQuote, TimeMs};
use crate::engine::{
    scenarios, HodlScenariosResponse, PortfolioSummary, PositionFacts, PositionInsights,
    PositionPerformance, PositionPnl, PositionRoi, PriceBook,
};
use crate::error::LedgerError;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Analytics {
    repo: Arc<Repository>,
    config: Config,
}

impl Analytics {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }

    pub async fn load_facts(&self, position_id: &PositionId) -> Result<PositionFacts, LedgerError> {
        let position = self
            .repo
            .get_position(position_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("position {}", position_id)))?;
        self.facts_for(position).await
    }

    async fn facts_for(&self, position: Position) -> Result<PositionFacts, LedgerError> {
        let id = &position.position_id;
        let (cost_basis, latest_snapshot, rewards, closure) = tokio::try_join!(
            self.repo.list_cost_basis(id),
            self.repo.latest_snapshot(id),
            self.repo.list_position_rewards(id),
            self.repo.get_closure(id),
        )?;
        Ok(PositionFacts {
            position,
            cost_basis,
            latest_snapshot,
            rewards,
            closure,
        })
    }

    /// Prices are valued at the exit date for closed positions, otherwise at
    /// `as_of` (default now).
    fn price_book(&self, facts: &PositionFacts, quotes: Vec<PriceQuote>, as_of: Option<TimeMs>) -> PriceBook {
        let valued_at = facts
            .closure
            .as_ref()
            .map(|c| c.exit_date)
            .or(as_of)
            .unwrap_or_else(TimeMs::now);
        PriceBook::new(quotes, valued_at, self.config.max_price_age_secs)
    }

    pub async fn pnl(&self, position_id: &PositionId) -> Result<PositionPnl, LedgerError> {
        let facts = self.load_facts(position_id).await?;
        let pnl = PositionPnl::from_facts(&facts);
        debug!(position_id = %position_id, unrealized = ?pnl.unrealized_pnl_usd, realized = ?pnl.realized_pnl_usd, "Computed P&L");
        Ok(pnl)
    }

    pub async fn roi(&self, position_id: &PositionId) -> Result<PositionRoi, LedgerError> {
        let facts = self.load_facts(position_id).await?;
        PositionRoi::from_facts(&facts, TimeMs::now(), self.config.low_confidence_days)
    }

    pub async fn performance(
        &self,
        position_id: &PositionId,
        quotes: Vec<PriceQuote>,
        as_of: Option<TimeMs>,
    ) -> Result<PositionPerformance, LedgerError> {
        let facts = self.load_facts(position_id).await?;
        let prices = self.price_book(&facts, quotes, as_of);
        let perf = PositionPerformance::from_facts(&facts, &prices, self.config.low_confidence_days)?;
        debug!(position_id = %position_id, il_pct = ?perf.il_percentage, lp_vs_hodl = ?perf.lp_vs_hodl_usd, "Computed performance");
        Ok(perf)
    }

    pub async fn hodl_scenarios(
        &self,
        position_id: &PositionId,
        quotes: Vec<PriceQuote>,
        as_of: Option<TimeMs>,
    ) -> Result<HodlScenariosResponse, LedgerError> {
        let facts = self.load_facts(position_id).await?;
        let prices = self.price_book(&facts, quotes, as_of);
        scenarios::hodl_scenarios(&facts, &prices)
    }

    pub async fn insights(
        &self,
        position_id: &PositionId,
        quotes: Vec<PriceQuote>,
        as_of: Option<TimeMs>,
    ) -> Result<PositionInsights, LedgerError> {
        let perf = self.performance(position_id, quotes, as_of).await?;
        Ok(PositionInsights::from_performance(&perf))
    }

    /// Wallet-wide summary, optionally converted into a display currency.
    pub async fn portfolio(
        &self,
        wallet: &Address,
        currency: Option<&str>,
    ) -> Result<PortfolioSummary, LedgerError> {
        let positions = self.repo.list_positions(wallet).await?;
        let facts = try_join_all(positions.into_iter().map(|p| self.facts_for(p))).await?;

        let summary = PortfolioSummary::from_facts(wallet.clone(), &facts);
        debug!(
            wallet = %wallet,
            open = summary.open_positions,
            closed = summary.closed_positions,
            "Computed portfolio summary"
        );
        match currency.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => summary.with_display_currency(&self.config.exchange_rates, code),
            None => Ok(summary),
        }
    }
}
