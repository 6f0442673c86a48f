//! Domain primitives: TimeMs, Address, PositionId.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn from_secs(secs: i64) -> Self {
        TimeMs(secs.saturating_mul(1000))
    }

    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Calendar month bucket in UTC, formatted `YYYY-MM`.
    pub fn month_key(&self) -> Option<String> {
        self.to_datetime()
            .map(|dt| format!("{:04}-{:02}", dt.year(), dt.month()))
    }

    /// Whole days elapsed from `earlier` to `self` (floor), never negative.
    pub fn whole_days_since(&self, earlier: TimeMs) -> i64 {
        (self.0.saturating_sub(earlier.0)).max(0) / MS_PER_DAY
    }

    /// Whole seconds elapsed from `earlier` to `self`; negative if `earlier`
    /// lies in the future.
    pub fn secs_since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0) / 1000
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Wallet address (hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Addresses are stored lowercased so lookups are case-insensitive.
    pub fn new(addr: String) -> Self {
        Address(addr.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key of a DeFi holding: wallet, chain, protocol and vault.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        PositionId(id.into())
    }

    /// Derive the key for a holding when the sync feed does not supply one.
    pub fn derive(wallet: &Address, chain_id: &str, protocol: &str, vault: &str) -> Self {
        PositionId(
            format!(
                "{}:{}:{}:{}",
                wallet.as_str(),
                chain_id.trim(),
                protocol.trim(),
                vault.trim()
            )
            .to_lowercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
