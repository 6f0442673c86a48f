//! Position ledger: cost basis, snapshots and closure.
//!
//! Validation happens here; the terminal transitions themselves are the
//! repository's conditional statements.

use crate::db::{ClosureInsert, CostBasisInsert, Repository, SnapshotInsert};
use crate::domain::{
    ClosureRequest, CostBasisEntry, Decimal, LedgerTransaction, NewCostBasisEntry, NewSnapshot,
    Position, PositionClosure, PositionId, PositionReward, PositionSnapshot, TimeMs, TokenLeg,
    TransactionKind,
};
use crate::engine::pnl::{pnl_pct, pnl_usd};
use crate::engine::{cumulative_cost_basis, earliest_deposit, rewards};
use crate::error::LedgerError;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct PositionLedger {
    repo: Arc<Repository>,
}

impl PositionLedger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub(crate) async fn require_position(&self, id: &PositionId) -> Result<Position, LedgerError> {
        self.repo
            .get_position(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("position {}", id)))
    }

    /// Append a deposit to the position's cost basis.
    pub async fn record_cost_basis(
        &self,
        position_id: &PositionId,
        entry: NewCostBasisEntry,
    ) -> Result<CostBasisEntry, LedgerError> {
        validate_new_entry(&entry, TimeMs::now())?;
        self.require_position(position_id).await?;

        match self
            .repo
            .insert_cost_basis(position_id, &entry, None, TimeMs::now())
            .await?
        {
            CostBasisInsert::Recorded(recorded) => {
                info!(
                    position_id = %position_id,
                    entry_id = recorded.id,
                    total_usd = %recorded.total_usd,
                    "Cost basis recorded"
                );
                Ok(recorded)
            }
            CostBasisInsert::PositionClosed => {
                warn!(position_id = %position_id, "Cost basis rejected: position closed");
                Err(LedgerError::PositionClosed(position_id.clone()))
            }
            CostBasisInsert::AlreadyReversed => Err(LedgerError::IllegalState(format!(
                "plain cost basis entry for {} collided with a reversal",
                position_id
            ))),
        }
    }

    /// Append the reversing counterpart of an entry.
    pub async fn reverse_cost_basis(
        &self,
        position_id: &PositionId,
        entry_id: i64,
    ) -> Result<CostBasisEntry, LedgerError> {
        let original = self
            .repo
            .get_cost_basis_entry(position_id, entry_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("cost basis entry {} of {}", entry_id, position_id))
            })?;
        if original.is_reversal() {
            return Err(LedgerError::Validation(format!(
                "entry {} is itself a reversal",
                entry_id
            )));
        }

        match self
            .repo
            .insert_cost_basis(position_id, &original.reversal(), Some(entry_id), TimeMs::now())
            .await?
        {
            CostBasisInsert::Recorded(reversal) => {
                info!(
                    position_id = %position_id,
                    entry_id,
                    reversal_id = reversal.id,
                    "Cost basis entry reversed"
                );
                Ok(reversal)
            }
            CostBasisInsert::PositionClosed => {
                warn!(position_id = %position_id, entry_id, "Reversal rejected: position closed");
                Err(LedgerError::PositionClosed(position_id.clone()))
            }
            CostBasisInsert::AlreadyReversed => {
                warn!(position_id = %position_id, entry_id, "Entry already reversed");
                Err(LedgerError::AlreadyReversed { entry_id })
            }
        }
    }

    pub async fn list_cost_basis(
        &self,
        position_id: &PositionId,
    ) -> Result<Vec<CostBasisEntry>, LedgerError> {
        self.require_position(position_id).await?;
        Ok(self.repo.list_cost_basis(position_id).await?)
    }

    /// Sum of all entries; `None` when nothing was ever recorded.
    pub async fn cumulative_cost_basis(
        &self,
        position_id: &PositionId,
    ) -> Result<Option<Decimal>, LedgerError> {
        let entries = self.list_cost_basis(position_id).await?;
        Ok(cumulative_cost_basis(&entries))
    }

    pub async fn append_snapshot(
        &self,
        position_id: &PositionId,
        snapshot: NewSnapshot,
    ) -> Result<PositionSnapshot, LedgerError> {
        if snapshot.balance.is_negative() || snapshot.balance_usd.is_negative() {
            return Err(LedgerError::Validation(
                "snapshot balances must not be negative".to_string(),
            ));
        }
        if snapshot.price_usd.is_negative() {
            return Err(LedgerError::Validation(
                "snapshot price_usd must not be negative".to_string(),
            ));
        }
        self.require_position(position_id).await?;

        match self.repo.insert_snapshot(position_id, &snapshot).await? {
            SnapshotInsert::Appended(stored) => {
                info!(
                    position_id = %position_id,
                    snapshot_date = %stored.snapshot_date,
                    balance_usd = %stored.balance_usd,
                    "Snapshot appended"
                );
                Ok(stored)
            }
            SnapshotInsert::OutOfOrder { latest } => {
                warn!(
                    position_id = %position_id,
                    latest = %latest,
                    attempted = %snapshot.snapshot_date,
                    "Out-of-order snapshot rejected"
                );
                Err(LedgerError::OutOfOrderSnapshot {
                    position_id: position_id.clone(),
                    latest,
                    attempted: snapshot.snapshot_date,
                })
            }
        }
    }

    /// Close a position, freezing its realized P&L.
    ///
    /// Exactly one close succeeds; every later attempt fails with
    /// `AlreadyClosed` carrying the original record.
    pub async fn close_position(
        &self,
        position_id: &PositionId,
        request: ClosureRequest,
    ) -> Result<PositionClosure, LedgerError> {
        let now = TimeMs::now();
        if request.exit_value_usd.is_negative() {
            return Err(LedgerError::Validation(
                "exit_value_usd must not be negative".to_string(),
            ));
        }
        if request.exit_date > now {
            return Err(LedgerError::Validation(format!(
                "exit_date {} is in the future",
                request.exit_date
            )));
        }
        let destination = request.destination_account_id.trim();
        if destination.is_empty() {
            return Err(LedgerError::Validation(
                "destination_account_id is required".to_string(),
            ));
        }

        self.require_position(position_id).await?;
        if let Some(existing) = self.repo.get_closure(position_id).await? {
            return Err(LedgerError::AlreadyClosed(Box::new(existing)));
        }

        let exit_transaction = LedgerTransaction {
            id: LedgerTransaction::new_id(),
            kind: TransactionKind::PositionExit,
            account_id: Some(destination.to_string()),
            position_id: Some(position_id.clone()),
            reward_id: None,
            amount_usd: request.exit_value_usd,
            occurred_at: request.exit_date,
            tx_hash: request.tx_hash.clone(),
            description: format!("Exit of position {}", position_id),
            created_at: now,
        };
        let transaction_id = exit_transaction.id.clone();

        // Runs under the write lock: the entries and rewards seen here are
        // the ones the closure freezes.
        let build = |entries: &[CostBasisEntry], attributed: &[PositionReward]| {
            if let Some(first_deposit) = earliest_deposit(entries) {
                if request.exit_date < first_deposit {
                    return Err(LedgerError::Validation(format!(
                        "exit_date {} precedes first deposit {}",
                        request.exit_date, first_deposit
                    )));
                }
            }
            let cost_basis = cumulative_cost_basis(entries);
            let rewards_total = rewards::total_usd(attributed);
            let realized = pnl_usd(request.exit_value_usd, cost_basis, rewards_total);
            Ok(PositionClosure {
                position_id: position_id.clone(),
                exit_date: request.exit_date,
                exit_value_usd: request.exit_value_usd,
                destination_account_id: destination.to_string(),
                tx_hash: request.tx_hash.clone(),
                cost_basis_usd: cost_basis,
                rewards_usd_at_close: rewards_total,
                realized_pnl_usd: realized,
                realized_pnl_pct: pnl_pct(realized, cost_basis),
                transaction_id,
                closed_at: now,
            })
        };

        match self
            .repo
            .insert_closure(position_id, &exit_transaction, build)
            .await?
        {
            ClosureInsert::Closed(closed) => {
                info!(
                    position_id = %position_id,
                    exit_value_usd = %closed.exit_value_usd,
                    realized_pnl_usd = ?closed.realized_pnl_usd,
                    transaction_id = %closed.transaction_id,
                    "Position closed"
                );
                Ok(closed)
            }
            ClosureInsert::AlreadyClosed(existing) => {
                warn!(position_id = %position_id, "Concurrent close lost; returning original closure");
                Err(LedgerError::AlreadyClosed(Box::new(existing)))
            }
        }
    }
}

fn validate_leg(name: &str, leg: &TokenLeg) -> Result<(), LedgerError> {
    if leg.symbol.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} symbol is required", name)));
    }
    if !leg.amount.is_positive() {
        return Err(LedgerError::Validation(format!(
            "{} amount must be positive, got {}",
            name, leg.amount
        )));
    }
    if leg.price_usd.is_some_and(|p| !p.is_positive()) {
        return Err(LedgerError::Validation(format!(
            "{} price_usd must be positive",
            name
        )));
    }
    Ok(())
}

fn validate_new_entry(entry: &NewCostBasisEntry, now: TimeMs) -> Result<(), LedgerError> {
    if !entry.total_usd.is_positive() {
        return Err(LedgerError::Validation(format!(
            "total_usd must be positive, got {}",
            entry.total_usd
        )));
    }
    if entry.deposited_at > now {
        return Err(LedgerError::Validation(format!(
            "deposited_at {} is in the future",
            entry.deposited_at
        )));
    }
    match (&entry.token_a, &entry.token_b) {
        (None, Some(_)) => {
            return Err(LedgerError::Validation(
                "token_b requires token_a".to_string(),
            ))
        }
        (Some(a), Some(b)) if a.symbol.trim().eq_ignore_ascii_case(b.symbol.trim()) => {
            return Err(LedgerError::Validation(
                "token_a and token_b must differ".to_string(),
            ))
        }
        _ => {}
    }
    if let Some(a) = &entry.token_a {
        validate_leg("token_a", a)?;
    }
    if let Some(b) = &entry.token_b {
        validate_leg("token_b", b)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn entry(total: &str) -> NewCostBasisEntry {
        NewCostBasisEntry {
            total_usd: d(total),
            token_a: None,
            token_b: None,
            deposited_at: TimeMs::new(1_000),
            tx_hash: None,
            vault_address: None,
        }
    }

    #[test]
    fn test_non_positive_total_rejected() {
        let now = TimeMs::new(10_000);
        assert!(validate_new_entry(&entry("100"), now).is_ok());
        assert!(matches!(
            validate_new_entry(&entry("0"), now),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            validate_new_entry(&entry("-5"), now),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_future_deposit_rejected() {
        let mut e = entry("100");
        e.deposited_at = TimeMs::new(20_000);
        assert!(matches!(
            validate_new_entry(&e, TimeMs::new(10_000)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_leg_rules() {
        let now = TimeMs::new(10_000);
        let leg = |symbol: &str, amount: &str| TokenLeg {
            symbol: symbol.to_string(),
            amount: d(amount),
            price_usd: None,
        };

        let mut e = entry("100");
        e.token_b = Some(leg("USDC", "100"));
        assert!(validate_new_entry(&e, now).is_err());

        e.token_a = Some(leg("usdc", "1"));
        assert!(validate_new_entry(&e, now).is_err());

        e.token_a = Some(leg("ETH", "0"));
        assert!(validate_new_entry(&e, now).is_err());

        e.token_a = Some(leg("ETH", "0.05"));
        assert!(validate_new_entry(&e, now).is_ok());
    }
}
