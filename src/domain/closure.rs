//! Position closure request and the frozen record written at close time.

use crate::domain::{Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRequest {
    pub exit_date: TimeMs,
    pub exit_value_usd: Decimal,
    pub destination_account_id: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Terminal record of a closed position.
///
/// `realized_pnl_usd` is frozen here; rewards attributed later are reported
/// separately as post-close rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionClosure {
    pub position_id: PositionId,
    pub exit_date: TimeMs,
    pub exit_value_usd: Decimal,
    pub destination_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub cost_basis_usd: Option<Decimal>,
    pub rewards_usd_at_close: Decimal,
    pub realized_pnl_usd: Option<Decimal>,
    pub realized_pnl_pct: Option<Decimal>,
    pub transaction_id: String,
    pub closed_at: TimeMs,
}

/// Response returned to the caller of a close request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureOutcome {
    pub realized_pnl_usd: Option<Decimal>,
    pub realized_pnl_pct: Option<Decimal>,
}

impl From<&PositionClosure> for ClosureOutcome {
    fn from(closure: &PositionClosure) -> Self {
        ClosureOutcome {
            realized_pnl_usd: closure.realized_pnl_usd,
            realized_pnl_pct: closure.realized_pnl_pct,
        }
    }
}
