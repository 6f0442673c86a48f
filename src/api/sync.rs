use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_wallet, AppState};
use crate::domain::RewardClaim;
use crate::error::AppError;
use crate::orchestration::{IngestionResult, PositionSyncItem};

#[derive(Debug, Deserialize)]
pub struct SyncPositionsRequest {
    pub wallet: String,
    pub positions: Vec<PositionSyncItem>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRewardsRequest {
    pub claims: Vec<RewardClaim>,
}

pub async fn sync_positions(
    State(state): State<AppState>,
    Json(body): Json<SyncPositionsRequest>,
) -> Result<Json<IngestionResult>, AppError> {
    let wallet = parse_wallet(&body.wallet)?;
    let result = state.ingestor.ingest_positions(&wallet, body.positions).await?;
    Ok(Json(result))
}

pub async fn sync_rewards(
    State(state): State<AppState>,
    Json(body): Json<SyncRewardsRequest>,
) -> Result<Json<IngestionResult>, AppError> {
    let result = state.ingestor.ingest_reward_claims(body.claims).await?;
    Ok(Json(result))
}
