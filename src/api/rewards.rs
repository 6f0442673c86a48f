use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_position_id, parse_wallet, AppState};
use crate::domain::{LedgerTransaction, PositionReward};
use crate::engine::{RewardMonthTotal, RewardTokenTotal};
use crate::error::AppError;
use crate::orchestration::{AttributionOutcome, BatchAttributionItem};

#[derive(Debug, Deserialize)]
pub struct RewardsQuery {
    pub wallet: String,
    pub unattributed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeRequest {
    pub position_id: String,
}

#[derive(Debug, Serialize)]
pub struct AttributeResponse {
    pub reward_id: i64,
    pub status: AttributionOutcome,
}

#[derive(Debug, Deserialize)]
pub struct BatchAttributeRequest {
    pub reward_ids: Vec<i64>,
    pub position_id: String,
}

#[derive(Debug, Serialize)]
pub struct BatchItemError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResponse {
    pub reward_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttributionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

impl From<BatchAttributionItem> for BatchItemResponse {
    fn from(item: BatchAttributionItem) -> Self {
        match item.result {
            Ok(status) => BatchItemResponse {
                reward_id: item.reward_id,
                status: Some(status),
                error: None,
            },
            Err(e) => BatchItemResponse {
                reward_id: item.reward_id,
                status: None,
                error: Some(BatchItemError {
                    code: e.code(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchAttributeResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub account_id: Option<String>,
}

pub async fn list_rewards(
    Query(params): Query<RewardsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PositionReward>>, AppError> {
    let wallet = parse_wallet(&params.wallet)?;
    let rewards = state
        .repo
        .list_wallet_rewards(&wallet, params.unattributed.unwrap_or(false))
        .await?;
    Ok(Json(rewards))
}

pub async fn attribute(
    Path(reward_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AttributeRequest>,
) -> Result<Json<AttributeResponse>, AppError> {
    let position_id = parse_position_id(&body.position_id)?;
    let status = state.attributor.attribute(reward_id, &position_id).await?;
    Ok(Json(AttributeResponse { reward_id, status }))
}

pub async fn attribute_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchAttributeRequest>,
) -> Result<Json<BatchAttributeResponse>, AppError> {
    let position_id = parse_position_id(&body.position_id)?;
    let items = state
        .attributor
        .batch_attribute(&body.reward_ids, &position_id)
        .await;

    let results: Vec<BatchItemResponse> = items.into_iter().map(Into::into).collect();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    Ok(Json(BatchAttributeResponse {
        succeeded: results.len() - failed,
        failed,
        results,
    }))
}

pub async fn create_transaction(
    Path(reward_id): Path<i64>,
    State(state): State<AppState>,
    body: Option<Json<CreateTransactionRequest>>,
) -> Result<(StatusCode, Json<LedgerTransaction>), AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let transaction = state
        .attributor
        .create_transaction_from_reward(reward_id, body.account_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn rewards_by_token(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RewardTokenTotal>>, AppError> {
    let id = parse_position_id(&id)?;
    Ok(Json(state.attributor.aggregate_by_token(&id).await?))
}

pub async fn rewards_by_month(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RewardMonthTotal>>, AppError> {
    let id = parse_position_id(&id)?;
    Ok(Json(state.attributor.aggregate_by_month(&id).await?))
}
