//! Point-in-time position snapshots.

use crate::domain::{Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

/// Snapshot as supplied by the periodic sync collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub price_usd: Decimal,
    #[serde(default)]
    pub protocol_apy: Option<Decimal>,
    pub snapshot_date: TimeMs,
}

/// A stored snapshot. Snapshots of one position are strictly ordered by
/// `snapshot_date` and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub id: i64,
    pub position_id: PositionId,
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub price_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_apy: Option<Decimal>,
    pub snapshot_date: TimeMs,
}
