use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{PositionClosure, PositionId, TimeMs};

/// Typed failures of the ledger, attribution and analytics operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(
        "snapshot for {position_id} at {attempted} is not after latest snapshot at {latest}"
    )]
    OutOfOrderSnapshot {
        position_id: PositionId,
        latest: TimeMs,
        attempted: TimeMs,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("reward {reward_id} is attributed to {attributed_to}, not {requested}")]
    Conflict {
        reward_id: i64,
        attributed_to: PositionId,
        requested: PositionId,
    },
    #[error("cost basis entry {entry_id} has already been reversed")]
    AlreadyReversed { entry_id: i64 },
    #[error("reward {reward_id} already converted to transaction {transaction_id}")]
    AlreadyConverted {
        reward_id: i64,
        transaction_id: String,
    },
    #[error("position {} is already closed", .0.position_id)]
    AlreadyClosed(Box<PositionClosure>),
    #[error("position {0} is closed")]
    PositionClosed(PositionId),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("price for {subject} is {age_secs}s old (max {max_age_secs}s)")]
    StalePrice {
        subject: String,
        age_secs: i64,
        max_age_secs: i64,
    },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl LedgerError {
    /// Machine-readable code surfaced at the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::OutOfOrderSnapshot { .. } => "out_of_order_snapshot",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict { .. } | LedgerError::AlreadyReversed { .. } => "conflict",
            LedgerError::AlreadyConverted { .. } => "already_converted",
            LedgerError::AlreadyClosed(_) => "already_closed",
            LedgerError::PositionClosed(_) => "position_closed",
            LedgerError::IllegalState(_) => "illegal_state",
            LedgerError::StalePrice { .. } => "stale_price",
            LedgerError::Db(_) => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Db(e) => AppError::Internal(e.to_string()),
            other => AppError::Ledger(other),
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::OutOfOrderSnapshot { .. }
        | LedgerError::Conflict { .. }
        | LedgerError::AlreadyReversed { .. }
        | LedgerError::AlreadyConverted { .. }
        | LedgerError::AlreadyClosed(_)
        | LedgerError::PositionClosed(_) => StatusCode::CONFLICT,
        LedgerError::StalePrice { .. } | LedgerError::IllegalState(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_details(err: &LedgerError) -> Option<Value> {
    match err {
        LedgerError::AlreadyConverted {
            reward_id,
            transaction_id,
        } => Some(json!({ "reward_id": reward_id, "transaction_id": transaction_id })),
        LedgerError::AlreadyClosed(closure) => serde_json::to_value(closure.as_ref()).ok(),
        LedgerError::Conflict {
            reward_id,
            attributed_to,
            ..
        } => Some(json!({ "reward_id": reward_id, "attributed_to": attributed_to })),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message, details) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config", msg, None),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg, None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            AppError::Ledger(err) => (
                ledger_status(&err),
                err.code(),
                err.to_string(),
                ledger_details(&err),
            ),
        };

        let mut body = json!({
            "error": error_message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
