//! Claimed reward events and the claim feed record they are built from.

use crate::domain::{Address, Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

/// Where a reward claim was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardSource {
    Merkl,
    Direct,
    Manual,
}

impl RewardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardSource::Merkl => "merkl",
            RewardSource::Direct => "direct",
            RewardSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merkl" => Some(RewardSource::Merkl),
            "direct" => Some(RewardSource::Direct),
            "manual" => Some(RewardSource::Manual),
            _ => None,
        }
    }
}

/// A reward claim as delivered by the chain-indexing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaim {
    pub wallet_address: String,
    pub chain_id: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub token_address: String,
    #[serde(default)]
    pub token_symbol: Option<String>,
    pub token_amount: Decimal,
    pub fiat_value: Decimal,
    /// Unix seconds.
    pub block_timestamp: i64,
    pub source: RewardSource,
}

impl RewardClaim {
    /// Compute a stable unique key for this claim.
    ///
    /// Priority: `chain_id:tx_hash:token_address` (if a tx hash is present) >
    /// truncated SHA-256 of the deterministic fields. One transaction may claim
    /// several tokens, so the token address is always part of the key.
    pub fn event_key(&self) -> String {
        if let Some(tx) = self.tx_hash.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return format!(
                "{}:{}:{}",
                self.chain_id.trim(),
                tx,
                self.token_address.trim()
            )
            .to_lowercase();
        }

        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u64).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, &self.wallet_address.trim().to_lowercase());
        hash_var(&mut hasher, self.chain_id.trim());
        hash_var(&mut hasher, &self.token_address.trim().to_lowercase());
        hash_var(&mut hasher, &self.token_amount.to_canonical_string());
        hasher.update(self.block_timestamp.to_le_bytes());
        hash_var(&mut hasher, self.source.as_str());
        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }

    pub fn claimed_at(&self) -> TimeMs {
        TimeMs::from_secs(self.block_timestamp)
    }

    pub fn symbol(&self) -> String {
        self.token_symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.token_address.trim())
            .to_string()
    }
}

/// A stored reward event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReward {
    pub id: i64,
    pub event_key: String,
    pub wallet_address: Address,
    pub chain_id: String,
    pub token_address: String,
    pub reward_token_symbol: String,
    pub reward_amount: Decimal,
    /// Priced at claim time.
    pub reward_usd: Decimal,
    pub claimed_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub source: RewardSource,
    pub is_attributed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<PositionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}
