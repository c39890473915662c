//! Service Configuration Settings
//!
//! Configuration types for the ticker service, loaded from environment
//! variables. Unparsable or out-of-range numeric values fall back to their
//! defaults; an unknown market name or a backoff ceiling below its floor is
//! rejected.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::domain::quote::Market;

/// Default spot ticker stream.
pub const DEFAULT_SPOT_URL: &str = "wss://stream.binance.com:9443/ws/!ticker@arr";

/// Default futures ticker stream.
pub const DEFAULT_FUTURES_URL: &str = "wss://fstream.binance.com/ws/!ticker@arr";

/// Feed connection settings shared by every market.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff. Never below 1.0.
    pub reconnect_delay_multiplier: f64,
    /// Fraction of each reconnection delay randomized, in `[0.0, 0.5]`.
    pub reconnect_jitter: f64,
    /// Whether normalized quotes are written to the store.
    pub store_writes_enabled: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_millis(30_000),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
            store_writes_enabled: true,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port of the read API and health endpoints.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 80 }
    }
}

/// Snapshot store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Redis URL; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    /// Key pattern used to enumerate quotes.
    ///
    /// Redis `KEYS` glob syntax: `*`, `?`, `[...]` classes (with `^`
    /// negation and `a-z` ranges) and `\` escapes. The in-memory store
    /// matches the same syntax.
    pub key_pattern: String,
    /// Bound on connecting to Redis and on each command's response.
    pub redis_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_pattern: "*".to_string(),
            redis_timeout: Duration::from_millis(5000),
        }
    }
}

/// One feed to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEndpoint {
    /// Market of the feed.
    pub market: Market,
    /// WebSocket URL.
    pub url: String,
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Feeds to run, in configuration order.
    pub feeds: Vec<FeedEndpoint>,
    /// Feed connection settings.
    pub feed: FeedSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Snapshot store settings.
    pub store: StoreSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            feeds: Market::all()
                .iter()
                .map(|&market| FeedEndpoint {
                    market,
                    url: default_url(market).to_string(),
                })
                .collect(),
            feed: FeedSettings::default(),
            server: ServerSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TICKER_FEEDS` names an unknown market or is empty,
    /// or if the reconnect delay ceiling is below the floor.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `TICKER_FEEDS` names an unknown market or is empty,
    /// or if the reconnect delay ceiling is below the floor.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let markets = match env.string("TICKER_FEEDS") {
            Some(raw) => parse_markets(&raw)?,
            None => Market::all().to_vec(),
        };

        let feeds = markets
            .into_iter()
            .map(|market| FeedEndpoint {
                market,
                url: env
                    .string(url_key(market))
                    .unwrap_or_else(|| default_url(market).to_string()),
            })
            .collect();

        let feed = FeedSettings {
            heartbeat_interval: env.duration_secs(
                "TICKER_HEARTBEAT_INTERVAL_SECS",
                defaults.feed.heartbeat_interval,
            ),
            reconnect_delay_initial: env.duration_millis(
                "TICKER_RECONNECT_DELAY_INITIAL_MS",
                defaults.feed.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_millis(
                "TICKER_RECONNECT_DELAY_MAX_MS",
                defaults.feed.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.float_in(
                "TICKER_RECONNECT_DELAY_MULTIPLIER",
                1.0..=f64::MAX,
                defaults.feed.reconnect_delay_multiplier,
            ),
            reconnect_jitter: env.float_in(
                "TICKER_RECONNECT_JITTER",
                0.0..=0.5,
                defaults.feed.reconnect_jitter,
            ),
            store_writes_enabled: env.bool(
                "TICKER_STORE_WRITES_ENABLED",
                defaults.feed.store_writes_enabled,
            ),
        };

        if feed.reconnect_delay_max < feed.reconnect_delay_initial {
            return Err(ConfigError::InvalidBackoff {
                initial: feed.reconnect_delay_initial,
                max: feed.reconnect_delay_max,
            });
        }

        let server = ServerSettings {
            port: env.parse("PORT", defaults.server.port),
        };

        let store = StoreSettings {
            redis_url: env.string("REDIS_URL"),
            key_pattern: env
                .string("TICKER_KEY_PATTERN")
                .unwrap_or(defaults.store.key_pattern),
            redis_timeout: env
                .duration_millis("TICKER_REDIS_TIMEOUT_MS", defaults.store.redis_timeout),
        };

        Ok(Self {
            feeds,
            feed,
            server,
            store,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A market name is not recognized.
    #[error("unknown market in TICKER_FEEDS: {0}")]
    UnknownMarket(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Backoff ceiling is below the floor.
    #[error("reconnect delay max {max:?} is below initial delay {initial:?}")]
    InvalidBackoff {
        /// Configured floor.
        initial: Duration,
        /// Configured ceiling.
        max: Duration,
    },
}

const fn default_url(market: Market) -> &'static str {
    match market {
        Market::Spot => DEFAULT_SPOT_URL,
        Market::Futures => DEFAULT_FUTURES_URL,
    }
}

const fn url_key(market: Market) -> &'static str {
    match market {
        Market::Spot => "TICKER_SPOT_URL",
        Market::Futures => "TICKER_FUTURES_URL",
    }
}

fn parse_markets(raw: &str) -> Result<Vec<Market>, ConfigError> {
    let mut markets = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let market: Market = name
            .parse()
            .map_err(|_| ConfigError::UnknownMarket(name.to_string()))?;
        if !markets.contains(&market) {
            markets.push(market);
        }
    }

    if markets.is_empty() {
        return Err(ConfigError::EmptyValue("TICKER_FEEDS".to_string()));
    }
    Ok(markets)
}

/// Variable source with typed accessors.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.string(key)
            .and_then(|v| match v.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&millis| millis > 0)
            .map_or(default, Duration::from_millis)
    }

    fn float_in(&self, key: &str, range: RangeInclusive<f64>, default: f64) -> f64 {
        self.string(key)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| range.contains(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.port, 80);
        assert!(config.store.redis_url.is_none());
        assert_eq!(config.store.key_pattern, "*");
        assert_eq!(
            config.feeds,
            vec![
                FeedEndpoint {
                    market: Market::Spot,
                    url: DEFAULT_SPOT_URL.to_string()
                },
                FeedEndpoint {
                    market: Market::Futures,
                    url: DEFAULT_FUTURES_URL.to_string()
                },
            ]
        );
        assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.feed.reconnect_delay_initial, Duration::from_millis(1000));
        assert_eq!(config.feed.reconnect_delay_max, Duration::from_millis(30_000));
        assert!((config.feed.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(config.feed.reconnect_jitter.abs() < f64::EPSILON);
        assert!(config.feed.store_writes_enabled);
        assert_eq!(config.store.redis_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn overrides_from_variables() {
        let config = load(&[
            ("PORT", "8080"),
            ("REDIS_URL", "redis://cache:6379"),
            ("TICKER_FEEDS", "futures"),
            ("TICKER_FUTURES_URL", "ws://localhost:9000/ws"),
            ("TICKER_HEARTBEAT_INTERVAL_SECS", "5"),
            ("TICKER_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("TICKER_RECONNECT_JITTER", "0.2"),
            ("TICKER_REDIS_TIMEOUT_MS", "750"),
            ("TICKER_STORE_WRITES_ENABLED", "false"),
            ("TICKER_KEY_PATTERN", "spot:*"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.store.key_pattern, "spot:*");
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].market, Market::Futures);
        assert_eq!(config.feeds[0].url, "ws://localhost:9000/ws");
        assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.feed.reconnect_delay_initial, Duration::from_millis(250));
        assert!((config.feed.reconnect_jitter - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.store.redis_timeout, Duration::from_millis(750));
        assert!(!config.feed.store_writes_enabled);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = load(&[
            ("PORT", "eighty"),
            ("TICKER_HEARTBEAT_INTERVAL_SECS", "0"),
            ("TICKER_RECONNECT_DELAY_MULTIPLIER", "fast"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 80);
        assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(30));
        assert!((config.feed.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_initial_delay_falls_back_to_default() {
        let config = load(&[("TICKER_RECONNECT_DELAY_INITIAL_MS", "0")]).unwrap();
        assert_eq!(config.feed.reconnect_delay_initial, Duration::from_millis(1000));
    }

    #[test_case("0.5" ; "shrinking")]
    #[test_case("0" ; "zero")]
    #[test_case("-2" ; "negative")]
    #[test_case("NaN" ; "not a number")]
    #[test_case("inf" ; "infinite")]
    fn multiplier_below_one_or_non_finite_falls_back(raw: &str) {
        let config = load(&[("TICKER_RECONNECT_DELAY_MULTIPLIER", raw)]).unwrap();
        assert!((config.feed.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn multiplier_of_one_is_accepted() {
        let config = load(&[("TICKER_RECONNECT_DELAY_MULTIPLIER", "1.0")]).unwrap();
        assert!((config.feed.reconnect_delay_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test_case("-0.1" ; "negative")]
    #[test_case("0.9" ; "too large")]
    fn jitter_out_of_range_falls_back(raw: &str) {
        let config = load(&[("TICKER_RECONNECT_JITTER", raw)]).unwrap();
        assert!(config.feed.reconnect_jitter.abs() < f64::EPSILON);
    }

    #[test]
    fn max_delay_below_initial_is_rejected() {
        assert!(matches!(
            load(&[
                ("TICKER_RECONNECT_DELAY_INITIAL_MS", "5000"),
                ("TICKER_RECONNECT_DELAY_MAX_MS", "2000"),
            ]),
            Err(ConfigError::InvalidBackoff { initial, max })
                if initial == Duration::from_secs(5) && max == Duration::from_secs(2)
        ));
    }

    #[test]
    fn initial_above_default_max_is_rejected() {
        assert!(matches!(
            load(&[("TICKER_RECONNECT_DELAY_INITIAL_MS", "60000")]),
            Err(ConfigError::InvalidBackoff { .. })
        ));
    }

    #[test]
    fn validated_settings_give_non_decreasing_backoff() {
        use crate::infrastructure::feed::{ReconnectConfig, ReconnectPolicy};

        let config = load(&[
            ("TICKER_RECONNECT_DELAY_INITIAL_MS", "0"),
            ("TICKER_RECONNECT_DELAY_MULTIPLIER", "0.5"),
        ])
        .unwrap();
        let mut policy = ReconnectPolicy::new(ReconnectConfig::from_feed_settings(&config.feed));

        let delays: Vec<u128> = (0..6).map(|_| policy.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000, 30_000]);
    }

    #[test]
    fn feed_list_is_deduplicated_and_case_insensitive() {
        let config = load(&[("TICKER_FEEDS", " Spot , spot,FUTURES ")]).unwrap();
        let markets: Vec<_> = config.feeds.iter().map(|f| f.market).collect();
        assert_eq!(markets, vec![Market::Spot, Market::Futures]);
    }

    #[test]
    fn unknown_market_is_rejected() {
        assert!(matches!(
            load(&[("TICKER_FEEDS", "spot,options")]),
            Err(ConfigError::UnknownMarket(name)) if name == "options"
        ));
    }

    #[test]
    fn empty_feed_list_is_rejected() {
        assert!(matches!(
            load(&[("TICKER_FEEDS", " , ")]),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn blank_redis_url_selects_memory_store() {
        let config = load(&[("REDIS_URL", "  ")]).unwrap();
        assert!(config.store.redis_url.is_none());
    }
}
