//! Normalized Quotes
//!
//! Domain types for the compact quote record stored per instrument, the
//! market label that partitions the key space, and the composite store key.
//!
//! # Stored Format (JSON)
//! ```json
//! {"market":"spot","symbol":"BTCUSDT","bid":"100.0","ask":"100.5","spread":"0.5","spread_percent":"0.4975124378109452736318407960"}
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

mod normalizer;

pub use normalizer::{QuoteMapping, QuoteNormalizer, ValidationError};

// =============================================================================
// Market
// =============================================================================

/// Market a feed belongs to. Each market owns a disjoint key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Spot market.
    Spot,
    /// Futures (derivatives) market.
    Futures,
}

impl Market {
    /// All markets, in key-prefix order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Spot, Self::Futures]
    }

    /// Market label used in store keys, metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Futures => "futures",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = UnknownMarket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "futures" => Ok(Self::Futures),
            other => Err(UnknownMarket(other.to_string())),
        }
    }
}

/// Error returned when a market label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown market: {0}")]
pub struct UnknownMarket(pub String);

// =============================================================================
// Store Key
// =============================================================================

/// Composite key `{market}:{symbol}` identifying one stored quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    market: Market,
    symbol: String,
}

impl StoreKey {
    /// Create a key for a symbol in a market.
    #[must_use]
    pub fn new(market: Market, symbol: impl Into<String>) -> Self {
        Self {
            market,
            symbol: symbol.into(),
        }
    }

    /// Market half of the key.
    #[must_use]
    pub const fn market(&self) -> Market {
        self.market
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.symbol)
    }
}

// =============================================================================
// Normalized Quote
// =============================================================================

/// Latest-known quote for one instrument.
///
/// `spread` and `spread_percent` are derived from `bid`/`ask` by
/// [`NormalizedQuote::new`] and never taken from upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    /// Market the quote came from.
    pub market: Market,
    /// Instrument symbol.
    pub symbol: String,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// `ask - bid`.
    pub spread: Decimal,
    /// `spread / ask * 100`, absent when `ask` is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_percent: Option<Decimal>,
    /// Traded volume, when the feed provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl NormalizedQuote {
    /// Build a quote, deriving spread and spread percent from bid and ask.
    #[must_use]
    pub fn new(
        market: Market,
        symbol: impl Into<String>,
        bid: Decimal,
        ask: Decimal,
        volume: Option<Decimal>,
    ) -> Self {
        let spread = ask - bid;
        Self {
            market,
            symbol: symbol.into(),
            bid,
            ask,
            spread,
            spread_percent: spread_percent(spread, ask),
            volume,
        }
    }

    /// Key this quote is stored under.
    #[must_use]
    pub fn store_key(&self) -> StoreKey {
        StoreKey::new(self.market, self.symbol.clone())
    }
}

/// `spread / ask * 100`; `None` when the division is undefined.
fn spread_percent(spread: Decimal, ask: Decimal) -> Option<Decimal> {
    if ask.is_zero() {
        return None;
    }
    spread
        .checked_div(ask)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn market_labels() {
        assert_eq!(Market::Spot.as_str(), "spot");
        assert_eq!(Market::Futures.as_str(), "futures");
        assert_eq!("SPOT".parse::<Market>().unwrap(), Market::Spot);
        assert_eq!(" futures ".parse::<Market>().unwrap(), Market::Futures);
        assert!("options".parse::<Market>().is_err());
    }

    #[test]
    fn store_key_prefixes_market() {
        let spot = StoreKey::new(Market::Spot, "BTCUSDT");
        let futures = StoreKey::new(Market::Futures, "BTCUSDT");
        assert_eq!(spot.to_string(), "spot:BTCUSDT");
        assert_eq!(futures.to_string(), "futures:BTCUSDT");
        assert_ne!(spot.to_string(), futures.to_string());
    }

    #[test]
    fn derives_spread_from_bid_and_ask() {
        let quote = NormalizedQuote::new(Market::Spot, "BTCUSDT", dec("100.0"), dec("100.5"), None);
        assert_eq!(quote.spread, dec("0.5"));
        assert_eq!(
            quote.spread_percent,
            Some(dec("0.5") / dec("100.5") * Decimal::ONE_HUNDRED)
        );
        assert_eq!(quote.store_key().to_string(), "spot:BTCUSDT");
    }

    #[test]
    fn zero_ask_has_no_spread_percent() {
        let quote = NormalizedQuote::new(Market::Spot, "DEADUSDT", dec("0"), dec("0"), None);
        assert_eq!(quote.spread, Decimal::ZERO);
        assert!(quote.spread_percent.is_none());
    }

    #[test]
    fn serializes_decimals_as_strings_and_omits_absent_fields() {
        let quote = NormalizedQuote::new(Market::Spot, "BTCUSDT", dec("100.0"), dec("100.5"), None);
        let json = serde_json::to_value(&quote).unwrap();

        assert_eq!(json["market"], "spot");
        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(json["bid"], "100.0");
        assert_eq!(json["ask"], "100.5");
        assert_eq!(json["spread"], "0.5");
        assert!(json["spread_percent"].as_str().unwrap().starts_with("0.4975"));
        assert!(json.get("volume").is_none());

        let zero_ask = NormalizedQuote::new(Market::Spot, "X", dec("0"), dec("0"), None);
        let json = serde_json::to_value(&zero_ask).unwrap();
        assert!(json.get("spread_percent").is_none());
    }

    #[test]
    fn round_trips_through_store_format() {
        let quote = NormalizedQuote::new(
            Market::Futures,
            "ETHUSDT",
            dec("2500.5"),
            dec("2500.5"),
            Some(dec("1250.25")),
        );
        let text = serde_json::to_string(&quote).unwrap();
        let back: NormalizedQuote = serde_json::from_str(&text).unwrap();
        assert_eq!(back, quote);
    }
}
