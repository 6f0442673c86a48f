//! Cost-basis ledger entries.

use crate::domain::{Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

/// One token leg of a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLeg {
    pub symbol: String,
    pub amount: Decimal,
    /// Entry price in USD; inferred from `total_usd` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<Decimal>,
}

/// Capital deposited into a position, as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCostBasisEntry {
    pub total_usd: Decimal,
    #[serde(default)]
    pub token_a: Option<TokenLeg>,
    #[serde(default)]
    pub token_b: Option<TokenLeg>,
    pub deposited_at: TimeMs,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub vault_address: Option<String>,
}

/// An immutable, recorded cost-basis entry.
///
/// Corrections are appended as reversing entries (`reverses_entry_id` set,
/// negated amounts); rows are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasisEntry {
    pub id: i64,
    pub position_id: PositionId,
    pub total_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_a: Option<TokenLeg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_b: Option<TokenLeg>,
    pub deposited_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses_entry_id: Option<i64>,
    pub recorded_at: TimeMs,
}

impl CostBasisEntry {
    pub fn is_reversal(&self) -> bool {
        self.reverses_entry_id.is_some()
    }

    /// Build the reversing counterpart of this entry.
    pub fn reversal(&self) -> NewCostBasisEntry {
        let negate = |leg: &TokenLeg| TokenLeg {
            symbol: leg.symbol.clone(),
            amount: -leg.amount,
            price_usd: leg.price_usd,
        };
        NewCostBasisEntry {
            total_usd: -self.total_usd,
            token_a: self.token_a.as_ref().map(negate),
            token_b: self.token_b.as_ref().map(negate),
            deposited_at: self.deposited_at,
            tx_hash: self.tx_hash.clone(),
            vault_address: self.vault_address.clone(),
        }
    }
}
