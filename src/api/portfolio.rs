use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_wallet, AppState};
use crate::engine::PortfolioSummary;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    pub wallet: String,
    /// Display currency; totals stay in USD when absent.
    pub currency: Option<String>,
}

pub async fn get_portfolio(
    Query(params): Query<PortfolioQuery>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioSummary>, AppError> {
    let wallet = parse_wallet(&params.wallet)?;
    let summary = state
        .analytics
        .portfolio(&wallet, params.currency.as_deref())
        .await?;
    Ok(Json(summary))
}
