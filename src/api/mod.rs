pub mod health;
pub mod portfolio;
pub mod positions;
pub mod rewards;
pub mod sync;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, PositionId};
use crate::error::AppError;
use crate::orchestration::{Analytics, PositionLedger, RewardAttributor, SyncIngestor};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ledger: PositionLedger,
    pub attributor: RewardAttributor,
    pub analytics: Analytics,
    pub ingestor: SyncIngestor,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            ledger: PositionLedger::new(repo.clone()),
            attributor: RewardAttributor::new(repo.clone()),
            analytics: Analytics::new(repo.clone(), config.clone()),
            ingestor: SyncIngestor::new(repo.clone()),
            repo,
            config,
        }
    }
}

pub(crate) fn parse_wallet(input: &str) -> Result<Address, AppError> {
    let input = input.trim();
    if !input.starts_with("0x") || input.len() < 3 {
        return Err(AppError::BadRequest("Invalid wallet address".to_string()));
    }
    if !input[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::BadRequest("Invalid wallet address".to_string()));
    }
    Ok(Address::new(input.to_string()))
}

pub(crate) fn parse_position_id(input: &str) -> Result<PositionId, AppError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::BadRequest("Empty position id".to_string()));
    }
    Ok(PositionId::new(input))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/sync/positions", post(sync::sync_positions))
        .route("/v1/sync/rewards", post(sync::sync_rewards))
        .route("/v1/positions", get(positions::list_positions))
        .route(
            "/v1/positions/:id/cost-basis",
            get(positions::get_cost_basis).post(positions::record_cost_basis),
        )
        .route(
            "/v1/positions/:id/cost-basis/:entry_id/reverse",
            post(positions::reverse_cost_basis),
        )
        .route("/v1/positions/:id/snapshots", post(positions::append_snapshot))
        .route("/v1/positions/:id/close", post(positions::close_position))
        .route("/v1/positions/:id/pnl", get(positions::get_pnl))
        .route("/v1/positions/:id/roi", get(positions::get_roi))
        .route("/v1/positions/:id/performance", post(positions::get_performance))
        .route(
            "/v1/positions/:id/hodl-scenarios",
            post(positions::get_hodl_scenarios),
        )
        .route("/v1/positions/:id/insights", post(positions::get_insights))
        .route(
            "/v1/positions/:id/rewards/by-token",
            get(rewards::rewards_by_token),
        )
        .route(
            "/v1/positions/:id/rewards/by-month",
            get(rewards::rewards_by_month),
        )
        .route("/v1/rewards", get(rewards::list_rewards))
        .route("/v1/rewards/attribute-batch", post(rewards::attribute_batch))
        .route("/v1/rewards/:id/attribute", post(rewards::attribute))
        .route("/v1/rewards/:id/transaction", post(rewards::create_transaction))
        .route("/v1/portfolio", get(portfolio::get_portfolio))
        .layer(cors)
        .with_state(state)
}
