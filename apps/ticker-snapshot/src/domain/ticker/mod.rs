//! Raw Ticker Events
//!
//! Wire shape of a single element of a ticker feed payload. Binance's
//! `!ticker@arr` streams send every field as a JSON string with one-letter
//! keys; the long names are accepted as aliases.
//!
//! # Wire Format (JSON)
//! ```json
//! {"e":"24hrTicker","s":"BTCUSDT","c":"100.2","b":"100.0","a":"100.5","v":"1520.4","Q":"0.25"}
//! ```

use serde::Deserialize;

/// A numeric wire field, sent either as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    /// Numeric value carried as a string (`"100.5"`).
    Text(String),
    /// Numeric value carried as a JSON number (`100.5`).
    Number(serde_json::Number),
}

impl WireNumber {
    /// Textual form of the number as it appeared on the wire.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl From<&str> for WireNumber {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One ticker element as received from the feed.
///
/// Every field is optional because feed variants differ: spot tickers carry
/// best bid/ask, futures tickers only last price and last quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawTickerEvent {
    /// Instrument symbol.
    #[serde(rename = "s", alias = "symbol", default)]
    pub symbol: Option<String>,

    /// Last traded price.
    #[serde(rename = "c", alias = "price", alias = "lastPrice", default)]
    pub last_price: Option<WireNumber>,

    /// Best bid price.
    #[serde(rename = "b", alias = "bid", default)]
    pub best_bid: Option<WireNumber>,

    /// Best ask price.
    #[serde(rename = "a", alias = "ask", default)]
    pub best_ask: Option<WireNumber>,

    /// Traded base volume.
    #[serde(rename = "v", alias = "volume", default)]
    pub volume: Option<WireNumber>,

    /// Quantity of the last fill.
    #[serde(rename = "Q", alias = "lastQty", default)]
    pub last_quantity: Option<WireNumber>,
}

impl RawTickerEvent {
    /// Interpret one decoded payload element as a ticker event.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the element is not an object or a field has
    /// the wrong JSON type (for example a numeric symbol).
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_binance_spot_ticker() {
        let value = serde_json::json!({
            "e": "24hrTicker",
            "E": 1_700_000_000_000_u64,
            "s": "BTCUSDT",
            "c": "100.2",
            "b": "100.0",
            "a": "100.5",
            "v": "1520.4"
        });

        let event = RawTickerEvent::from_value(value).unwrap();
        assert_eq!(event.symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(event.last_price, Some(WireNumber::from("100.2")));
        assert_eq!(event.best_bid, Some(WireNumber::from("100.0")));
        assert_eq!(event.best_ask, Some(WireNumber::from("100.5")));
        assert_eq!(event.volume, Some(WireNumber::from("1520.4")));
        assert!(event.last_quantity.is_none());
    }

    #[test]
    fn accepts_long_field_names_and_json_numbers() {
        let value = serde_json::json!({
            "symbol": "ETHUSDT",
            "price": 2500.5,
            "bid": 2500,
            "ask": "2501"
        });

        let event = RawTickerEvent::from_value(value).unwrap();
        assert_eq!(event.symbol.as_deref(), Some("ETHUSDT"));
        assert_eq!(event.last_price.unwrap().as_text(), "2500.5");
        assert_eq!(event.best_bid.unwrap().as_text(), "2500");
    }

    #[test]
    fn missing_fields_are_none() {
        let event = RawTickerEvent::from_value(serde_json::json!({})).unwrap();
        assert_eq!(event, RawTickerEvent::default());
    }

    #[test]
    fn rejects_non_object_elements() {
        assert!(RawTickerEvent::from_value(serde_json::json!("BTCUSDT")).is_err());
        assert!(RawTickerEvent::from_value(serde_json::json!({"s": 42})).is_err());
    }
}
