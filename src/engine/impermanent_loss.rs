//! Impermanent loss of a constant-product LP position versus holding.
//!
//! For entry prices `(pa0, pb0)` and current prices `(pa1, pb1)`:
//!
//! ```text
//! k       = (pa1 / pa0) / (pb1 / pb0)
//! il      = 2 * sqrt(k) / (1 + k) - 1        (always <= 0)
//! hodl    = a0 * pa1 + b0 * pb1
//! ```

use super::{EntryLeg, PCT_DP};
use crate::domain::{Decimal, PriceQuote, TimeMs};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Precision at which the IL sign is checked. Rounding noise in `sqrt` below
/// this scale is not evidence of a bad price.
const IL_CHECK_DP: u32 = 16;

/// Caller-supplied current prices, validated against a staleness tolerance.
#[derive(Debug, Clone)]
pub struct PriceBook {
    quotes: HashMap<String, PriceQuote>,
    valued_at: TimeMs,
    max_age_secs: i64,
}

impl PriceBook {
    /// `valued_at` is the instant the prices are meant to describe; quotes
    /// further than `max_age_secs` from it are rejected as stale.
    pub fn new(quotes: Vec<PriceQuote>, valued_at: TimeMs, max_age_secs: i64) -> Self {
        let quotes = quotes
            .into_iter()
            .map(|q| (q.symbol.trim().to_uppercase(), q))
            .collect();
        Self {
            quotes,
            valued_at,
            max_age_secs,
        }
    }

    pub fn valued_at(&self) -> TimeMs {
        self.valued_at
    }

    /// Reject an observation taken too long before (or after) `valued_at`.
    pub fn check_fresh(&self, subject: &str, observed_at: TimeMs) -> Result<(), LedgerError> {
        let age_secs = self.valued_at.secs_since(observed_at).abs();
        if age_secs > self.max_age_secs {
            tracing::warn!(subject, age_secs, max_age_secs = self.max_age_secs, "Rejecting stale price");
            return Err(LedgerError::StalePrice {
                subject: subject.to_string(),
                age_secs,
                max_age_secs: self.max_age_secs,
            });
        }
        Ok(())
    }

    /// Fresh, positive USD price for `symbol`.
    pub fn price(&self, symbol: &str) -> Result<Decimal, LedgerError> {
        let key = symbol.trim().to_uppercase();
        let quote = self
            .quotes
            .get(&key)
            .ok_or_else(|| LedgerError::Validation(format!("missing price quote for {}", key)))?;
        if !quote.price_usd.is_positive() {
            return Err(LedgerError::IllegalState(format!(
                "non-positive price {} for {}",
                quote.price_usd, key
            )));
        }
        self.check_fresh(&key, quote.as_of)?;
        Ok(quote.price_usd)
    }
}

/// Price ratio `k` of token A relative to token B since entry.
pub fn price_ratio(
    pa0: Decimal,
    pa1: Decimal,
    pb0: Decimal,
    pb1: Decimal,
) -> Result<Decimal, LedgerError> {
    for (label, p) in [("entry A", pa0), ("current A", pa1), ("entry B", pb0), ("current B", pb1)] {
        if !p.is_positive() {
            return Err(LedgerError::IllegalState(format!(
                "{} price must be positive, got {}",
                label, p
            )));
        }
    }
    let rel_a = pa1 / pa0;
    let rel_b = pb1 / pb0;
    rel_a
        .checked_div(rel_b)
        .ok_or_else(|| LedgerError::IllegalState("price ratio underflowed to zero".to_string()))
}

/// Impermanent loss as a percentage (`<= 0`) for price ratio `k`.
///
/// A positive result can only come from corrupt inputs and is reported as
/// `IllegalState` instead of being clamped.
pub fn impermanent_loss_pct(k: Decimal) -> Result<Decimal, LedgerError> {
    if !k.is_positive() {
        return Err(LedgerError::IllegalState(format!(
            "price ratio must be positive, got {}",
            k
        )));
    }
    if k == Decimal::one() {
        return Ok(Decimal::zero());
    }

    let root = k
        .sqrt()
        .ok_or_else(|| LedgerError::IllegalState(format!("sqrt of price ratio {} failed", k)))?;
    let two = Decimal::from_i64(2);
    let il = (two * root / (Decimal::one() + k) - Decimal::one()).round_dp(IL_CHECK_DP);

    if il.is_positive() {
        tracing::warn!(k = %k, il = %il, "Positive impermanent loss computed");
        return Err(LedgerError::IllegalState(format!(
            "impermanent loss {} is positive for price ratio {}; upstream prices are inconsistent",
            il, k
        )));
    }
    if il.is_zero() {
        return Ok(Decimal::zero());
    }
    Ok((il * Decimal::hundred()).round_dp(PCT_DP))
}

/// Value of holding `legs` at the current prices.
pub fn hodl_value_usd(legs: &[EntryLeg], prices: &PriceBook) -> Result<Decimal, LedgerError> {
    let mut total = Decimal::zero();
    for leg in legs {
        total += leg.amount * prices.price(&leg.symbol)?;
    }
    Ok(total)
}

/// LP versus buy-and-hold comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpVsHodl {
    /// `None` for single-asset positions, which have no IL.
    pub price_ratio: Option<Decimal>,
    pub il_percentage: Option<Decimal>,
    pub il_usd: Option<Decimal>,
    pub hodl_value_usd: Decimal,
    pub lp_vs_hodl_usd: Decimal,
    pub lp_outperformed_hodl: bool,
}

/// Compare the current LP value against holding the deposited tokens.
///
/// Two legs get the full IL treatment; one leg reports only HODL-vs-actual.
pub fn compare_lp_to_hodl(
    legs: &[EntryLeg],
    prices: &PriceBook,
    current_lp_value_usd: Decimal,
) -> Result<LpVsHodl, LedgerError> {
    let hodl = hodl_value_usd(legs, prices)?;
    let lp_vs_hodl = current_lp_value_usd - hodl;

    let (k, il_pct, il_usd) = match legs {
        [a, b] => {
            let k = price_ratio(
                a.entry_price_usd,
                prices.price(&a.symbol)?,
                b.entry_price_usd,
                prices.price(&b.symbol)?,
            )?;
            let il_pct = impermanent_loss_pct(k)?;
            let il_usd = hodl * il_pct / Decimal::hundred();
            (Some(k.round_dp(PCT_DP)), Some(il_pct), Some(il_usd))
        }
        [_] => (None, None, None),
        _ => {
            return Err(LedgerError::Validation(format!(
                "expected one or two token legs, got {}",
                legs.len()
            )))
        }
    };

    Ok(LpVsHodl {
        price_ratio: k,
        il_percentage: il_pct,
        il_usd,
        hodl_value_usd: hodl,
        lp_vs_hodl_usd: lp_vs_hodl,
        lp_outperformed_hodl: lp_vs_hodl.is_positive(),
    })
}
