//! Ledger transactions spawned by reward conversion and position exits.

use crate::domain::{Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Income booked from a claimed reward.
    RewardIncome,
    /// Proceeds of a closed position moved to an account.
    PositionExit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::RewardIncome => "reward_income",
            TransactionKind::PositionExit => "position_exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reward_income" => Some(TransactionKind::RewardIncome),
            "position_exit" => Some(TransactionKind::PositionExit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<PositionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_id: Option<i64>,
    pub amount_usd: Decimal,
    pub occurred_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub description: String,
    pub created_at: TimeMs,
}

impl LedgerTransaction {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
