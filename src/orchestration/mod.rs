//! Services that validate requests, drive the repository's atomic
//! transitions and assemble facts for the engine.

pub mod analytics;
pub mod attribution;
pub mod ingest;
pub mod ledger;

pub use analytics::Analytics;
pub use attribution::{AttributionOutcome, BatchAttributionItem, RewardAttributor};
pub use ingest::{IngestionResult, PositionSyncItem, SyncIngestor};
pub use ledger::PositionLedger;
