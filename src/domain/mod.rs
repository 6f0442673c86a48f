//! Domain types for the DeFi position ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Address, PositionId
//! - Persisted ledger entities: positions, cost basis, snapshots, rewards,
//!   closures and ledger transactions
//! - Caller-supplied market inputs: price quotes and exchange rates

pub mod closure;
pub mod cost_basis;
pub mod decimal;
pub mod position;
pub mod price;
pub mod primitives;
pub mod reward;
pub mod snapshot;
pub mod transaction;

pub use closure::{ClosureOutcome, ClosureRequest, PositionClosure};
pub use cost_basis::{CostBasisEntry, NewCostBasisEntry, TokenLeg};
pub use decimal::Decimal;
pub use position::{Position, ProtocolModule};
pub use price::{ExchangeRates, PriceQuote};
pub use primitives::{Address, PositionId, TimeMs};
pub use reward::{PositionReward, RewardClaim, RewardSource};
pub use snapshot::{NewSnapshot, PositionSnapshot};
pub use transaction::{LedgerTransaction, TransactionKind};
