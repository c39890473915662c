//! Configuration Module
//!
//! Configuration loading for the ticker service.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_FUTURES_URL, DEFAULT_SPOT_URL, FeedEndpoint, FeedSettings,
    ServerSettings, ServiceConfig, StoreSettings,
};
