//! Already-resolved market prices and display-currency rates.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A USD price for a token symbol observed at `as_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price_usd: Decimal,
    pub as_of: TimeMs,
}

/// Exchange-rate table: units of USD per one unit of the currency.
///
/// Used only to convert finished USD figures for display; engine math stays
/// USD-denominated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeRates {
    rates: HashMap<String, Decimal>,
}

impl ExchangeRates {
    pub fn new(rates: HashMap<String, Decimal>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.trim().to_uppercase(), rate))
            .collect();
        Self { rates }
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        let code = currency.trim().to_uppercase();
        if code == "USD" {
            return Some(Decimal::one());
        }
        self.rates.get(&code).copied()
    }

    /// Convert a USD amount into `currency`; `None` for unknown or zero rates.
    pub fn from_usd(&self, amount_usd: Decimal, currency: &str) -> Option<Decimal> {
        self.rate(currency)
            .and_then(|rate| amount_usd.checked_div(rate))
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
