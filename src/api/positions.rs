use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_position_id, parse_wallet, AppState};
use crate::domain::{
    ClosureOutcome, ClosureRequest, CostBasisEntry, Decimal, NewCostBasisEntry, NewSnapshot,
    Position, PositionSnapshot, PriceQuote, TimeMs,
};
use crate::engine::{
    cumulative_cost_basis, HodlScenariosResponse, PositionInsights, PositionPerformance,
    PositionPnl, PositionRoi,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct CostBasisResponse {
    pub entries: Vec<CostBasisEntry>,
    /// `null` when nothing has been recorded.
    pub cumulative_cost_basis_usd: Option<Decimal>,
}

/// Caller-resolved market prices for IL and HODL views.
#[derive(Debug, Deserialize)]
pub struct PricesRequest {
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
    #[serde(default)]
    pub as_of: Option<TimeMs>,
}

pub async fn list_positions(
    Query(params): Query<WalletQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Position>>, AppError> {
    let wallet = parse_wallet(&params.wallet)?;
    Ok(Json(state.repo.list_positions(&wallet).await?))
}

pub async fn get_cost_basis(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CostBasisResponse>, AppError> {
    let id = parse_position_id(&id)?;
    let entries = state.ledger.list_cost_basis(&id).await?;
    Ok(Json(CostBasisResponse {
        cumulative_cost_basis_usd: cumulative_cost_basis(&entries),
        entries,
    }))
}

pub async fn record_cost_basis(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(entry): Json<NewCostBasisEntry>,
) -> Result<(StatusCode, Json<CostBasisEntry>), AppError> {
    let id = parse_position_id(&id)?;
    let recorded = state.ledger.record_cost_basis(&id, entry).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub async fn reverse_cost_basis(
    Path((id, entry_id)): Path<(String, i64)>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CostBasisEntry>), AppError> {
    let id = parse_position_id(&id)?;
    let reversal = state.ledger.reverse_cost_basis(&id, entry_id).await?;
    Ok((StatusCode::CREATED, Json(reversal)))
}

pub async fn append_snapshot(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(snapshot): Json<NewSnapshot>,
) -> Result<(StatusCode, Json<PositionSnapshot>), AppError> {
    let id = parse_position_id(&id)?;
    let stored = state.ledger.append_snapshot(&id, snapshot).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn close_position(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ClosureRequest>,
) -> Result<Json<ClosureOutcome>, AppError> {
    let id = parse_position_id(&id)?;
    let closure = state.ledger.close_position(&id, request).await?;
    Ok(Json(ClosureOutcome::from(&closure)))
}

pub async fn get_pnl(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PositionPnl>, AppError> {
    let id = parse_position_id(&id)?;
    Ok(Json(state.analytics.pnl(&id).await?))
}

pub async fn get_roi(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PositionRoi>, AppError> {
    let id = parse_position_id(&id)?;
    Ok(Json(state.analytics.roi(&id).await?))
}

pub async fn get_performance(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PricesRequest>,
) -> Result<Json<PositionPerformance>, AppError> {
    let id = parse_position_id(&id)?;
    let perf = state
        .analytics
        .performance(&id, body.prices, body.as_of)
        .await?;
    Ok(Json(perf))
}

pub async fn get_hodl_scenarios(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PricesRequest>,
) -> Result<Json<HodlScenariosResponse>, AppError> {
    let id = parse_position_id(&id)?;
    let scenarios = state
        .analytics
        .hodl_scenarios(&id, body.prices, body.as_of)
        .await?;
    Ok(Json(scenarios))
}

pub async fn get_insights(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PricesRequest>,
) -> Result<Json<PositionInsights>, AppError> {
    let id = parse_position_id(&id)?;
    let insights = state
        .analytics
        .insights(&id, body.prices, body.as_of)
        .await?;
    Ok(Json(insights))
}
