//! Quote Normalizer
//!
//! Pure transformation from a [`RawTickerEvent`] into a [`NormalizedQuote`].
//!
//! Each market uses one explicit [`QuoteMapping`]:
//!
//! - `BookTicker` (spot): bid and ask come from the best bid/ask fields and
//!   volume from the base volume field.
//! - `LastPrice` (futures): the last price stands in for both bid and ask, and
//!   volume is the notional of the last fill (`last price * last quantity`).
//!
//! Every mapping requires a non-empty symbol and a last price above zero.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::{Market, NormalizedQuote};
use crate::domain::ticker::{RawTickerEvent, WireNumber};

/// Validation failures for a single ticker element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Element could not be read as a ticker object.
    #[error("malformed ticker element: {0}")]
    Malformed(String),

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but not a decimal number.
    #[error("field `{field}` is not numeric: {value:?}")]
    NotNumeric {
        /// Field name.
        field: &'static str,
        /// Raw value as received.
        value: String,
    },

    /// Last price is zero or negative.
    #[error("last price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    /// A price or volume field is negative.
    #[error("field `{field}` must not be negative, got {value}")]
    Negative {
        /// Field name.
        field: &'static str,
        /// Parsed value.
        value: Decimal,
    },
}

impl ValidationError {
    /// Short reason label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::MissingField(_) => "missing_field",
            Self::NotNumeric { .. } => "not_numeric",
            Self::NonPositivePrice(_) => "non_positive_price",
            Self::Negative { .. } => "negative",
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// How bid, ask and volume are derived from a raw ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMapping {
    /// Bid/ask from the best bid/ask fields, volume from base volume.
    BookTicker,
    /// Bid = ask = last price, volume = last price * last quantity.
    LastPrice,
}

impl QuoteMapping {
    /// Default mapping for a market.
    #[must_use]
    pub const fn for_market(market: Market) -> Self {
        match market {
            Market::Spot => Self::BookTicker,
            Market::Futures => Self::LastPrice,
        }
    }
}

/// Normalizer bound to one market and its mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteNormalizer {
    market: Market,
    mapping: QuoteMapping,
}

impl QuoteNormalizer {
    /// Create a normalizer with an explicit mapping.
    #[must_use]
    pub const fn new(market: Market, mapping: QuoteMapping) -> Self {
        Self { market, mapping }
    }

    /// Create a normalizer with the market's default mapping.
    #[must_use]
    pub const fn for_market(market: Market) -> Self {
        Self::new(market, QuoteMapping::for_market(market))
    }

    /// Market this normalizer labels quotes with.
    #[must_use]
    pub const fn market(&self) -> Market {
        self.market
    }

    /// Mapping rule in use.
    #[must_use]
    pub const fn mapping(&self) -> QuoteMapping {
        self.mapping
    }

    /// Normalize one raw ticker.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a required field is missing or not
    /// numeric, the last price is not positive, or a price/volume is negative.
    pub fn normalize(&self, raw: &RawTickerEvent) -> Result<NormalizedQuote, ValidationError> {
        let symbol = raw
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("symbol"))?;

        let price = required_decimal("price", raw.last_price.as_ref())?;
        if price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice(price));
        }

        let (bid, ask, volume) = match self.mapping {
            QuoteMapping::BookTicker => {
                let bid = required_decimal("bid", raw.best_bid.as_ref())?;
                let ask = required_decimal("ask", raw.best_ask.as_ref())?;
                let volume = optional_decimal("volume", raw.volume.as_ref())?;
                (bid, ask, volume)
            }
            QuoteMapping::LastPrice => {
                let quantity = optional_decimal("last_quantity", raw.last_quantity.as_ref())?;
                if let Some(q) = quantity {
                    non_negative("last_quantity", q)?;
                }
                let volume = quantity.and_then(|q| price.checked_mul(q));
                (price, price, volume)
            }
        };

        non_negative("bid", bid)?;
        non_negative("ask", ask)?;
        if let Some(v) = volume {
            non_negative("volume", v)?;
        }

        Ok(NormalizedQuote::new(self.market, symbol, bid, ask, volume))
    }
}

fn required_decimal(
    field: &'static str,
    value: Option<&WireNumber>,
) -> Result<Decimal, ValidationError> {
    optional_decimal(field, value)?.ok_or(ValidationError::MissingField(field))
}

fn optional_decimal(
    field: &'static str,
    value: Option<&WireNumber>,
) -> Result<Option<Decimal>, ValidationError> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

fn parse_decimal(field: &'static str, value: &WireNumber) -> Result<Decimal, ValidationError> {
    let text = value.as_text();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ValidationError::NotNumeric { field, value: text })
}

fn non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}
