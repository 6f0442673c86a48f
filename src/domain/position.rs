//! DeFi position as reported by the wallet sync feed.

use crate::domain::{Address, Decimal, PositionId, TimeMs};
use serde::{Deserialize, Serialize};

/// Protocol module a position lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolModule {
    LiquidityPool,
    Staking,
    Lending,
    Farming,
    Vault,
}

impl ProtocolModule {
    /// Whether positions in this module can hold a two-token pool share.
    ///
    /// Farming positions are typically staked LP tokens, so they are eligible
    /// for impermanent-loss analysis when their cost basis records two legs.
    pub fn supports_two_token_pool(&self) -> bool {
        match self {
            ProtocolModule::LiquidityPool | ProtocolModule::Farming => true,
            ProtocolModule::Staking | ProtocolModule::Lending | ProtocolModule::Vault => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolModule::LiquidityPool => "liquidity_pool",
            ProtocolModule::Staking => "staking",
            ProtocolModule::Lending => "lending",
            ProtocolModule::Farming => "farming",
            ProtocolModule::Vault => "vault",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "liquidity_pool" => Some(ProtocolModule::LiquidityPool),
            "staking" => Some(ProtocolModule::Staking),
            "lending" => Some(ProtocolModule::Lending),
            "farming" => Some(ProtocolModule::Farming),
            "vault" => Some(ProtocolModule::Vault),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DeFi holding, refreshed on each sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub wallet_address: Address,
    pub chain_id: String,
    pub protocol: String,
    pub protocol_module: ProtocolModule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub price_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub updated_at: TimeMs,
}
