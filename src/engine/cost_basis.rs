//! Cost-basis folding: cumulative totals, holding start and entry composition.

use crate::domain::{CostBasisEntry, Decimal, TimeMs};
use crate::error::LedgerError;

/// Net amount of one token deposited across all entries, with its
/// amount-weighted entry price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLeg {
    pub symbol: String,
    pub amount: Decimal,
    pub entry_price_usd: Decimal,
}

impl EntryLeg {
    pub fn entry_value_usd(&self) -> Decimal {
        self.amount * self.entry_price_usd
    }
}

/// Sum of all entries, or `None` when nothing has been recorded.
///
/// `Some(0)` (fully reversed) and `None` (never recorded) are different
/// answers and callers must keep them apart.
pub fn cumulative_cost_basis(entries: &[CostBasisEntry]) -> Option<Decimal> {
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.total_usd).sum())
}

/// Deposit date of the earliest entry that has not been reversed.
pub fn earliest_deposit(entries: &[CostBasisEntry]) -> Option<TimeMs> {
    let reversed: Vec<i64> = entries.iter().filter_map(|e| e.reverses_entry_id).collect();
    entries
        .iter()
        .filter(|e| !e.is_reversal() && !reversed.contains(&e.id))
        .map(|e| e.deposited_at)
        .min()
}

/// Aggregate the per-token split of all entries.
///
/// Returns `Ok(None)` when any entry lacks a token split, since the HODL
/// baseline cannot be reconstructed from partial data. Missing entry prices
/// are inferred from `total_usd`: a two-leg deposit is assumed value-balanced
/// and a one-leg deposit is priced at `total_usd / amount`.
pub fn entry_composition(entries: &[CostBasisEntry]) -> Result<Option<Vec<EntryLeg>>, LedgerError> {
    if entries.is_empty() {
        return Ok(None);
    }

    // (symbol, amount, value) in first-seen order
    let mut acc: Vec<(String, Decimal, Decimal)> = Vec::new();

    for entry in entries {
        let legs: Vec<_> = entry.token_a.iter().chain(entry.token_b.iter()).collect();
        if legs.is_empty() {
            return Ok(None);
        }
        let share = entry
            .total_usd
            .checked_div(Decimal::from_i64(legs.len() as i64))
            .unwrap_or_default();

        for leg in legs {
            if leg.amount.is_zero() {
                return Err(LedgerError::Validation(format!(
                    "cost basis entry {} has a zero {} amount",
                    entry.id, leg.symbol
                )));
            }
            let price = match leg.price_usd {
                Some(p) => p,
                None => share.checked_div(leg.amount).unwrap_or_default(),
            };
            let key = leg.symbol.trim().to_uppercase();
            match acc.iter_mut().find(|(s, _, _)| *s == key) {
                Some((_, amount, value)) => {
                    *amount += leg.amount;
                    *value += leg.amount * price;
                }
                None => acc.push((key, leg.amount, leg.amount * price)),
            }
        }
    }

    let legs: Vec<EntryLeg> = acc
        .into_iter()
        .filter(|(_, amount, _)| !amount.is_zero())
        .map(|(symbol, amount, value)| EntryLeg {
            entry_price_usd: value.checked_div(amount).unwrap_or_default(),
            symbol,
            amount,
        })
        .collect();

    if legs.is_empty() {
        return Ok(None);
    }
    if legs.len() > 2 {
        return Err(LedgerError::Validation(format!(
            "cost basis spans {} distinct tokens; at most two are supported",
            legs.len()
        )));
    }
    Ok(Some(legs))
}
