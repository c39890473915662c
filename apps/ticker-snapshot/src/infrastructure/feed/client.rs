//! Ticker Feed Connection Manager
//!
//! Keeps one WebSocket subscription to a ticker feed alive indefinitely.
//!
//! # Protocol
//!
//! The feed pushes one JSON array of ticker objects per text message. The
//! manager never writes application messages; it only sends heartbeat pings
//! and answers server pings.
//!
//! # Lifecycle
//!
//! The manager is driven by [`ConnectionState`]: every action it performs
//! (connect, stream with heartbeat armed, wait out backoff, close) produces
//! the next [`ConnectionEvent`]. Socket reads, the heartbeat timer and the
//! shutdown token are multiplexed in one task, so the state is never shared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, TickerCodec};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent};
use super::reconnect::ReconnectConfig;
use super::state::{ConnectionAction, ConnectionEvent, ConnectionPhase, ConnectionState};
use super::status::FeedStatus;
use super::writer::{QuoteSender, enqueue, spawn_writer};
use crate::application::services::SnapshotStore;
use crate::domain::quote::{Market, QuoteMapping, QuoteNormalizer, ValidationError};
use crate::domain::ticker::RawTickerEvent;
use crate::infrastructure::metrics;

type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Error Type
// =============================================================================

/// Reasons an open connection is abandoned. All of them lead to a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Remote closed the connection.
    #[error("connection closed by remote")]
    ConnectionClosed,

    /// No activity since the previous heartbeat probe.
    #[error("heartbeat timeout after {0:?} without activity")]
    HeartbeatTimeout(Duration),
}

impl FeedError {
    /// Short error label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "transport",
            Self::ConnectionClosed => "remote_close",
            Self::HeartbeatTimeout(_) => "heartbeat_timeout",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Market the feed belongs to.
    pub market: Market,
    /// WebSocket URL.
    pub url: String,
    /// How raw tickers map to bid/ask/volume.
    pub mapping: QuoteMapping,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
    /// Whether normalized quotes are written to the store.
    pub persist: bool,
}

impl FeedConfig {
    /// Create a configuration with the market's default mapping.
    #[must_use]
    pub fn new(market: Market, url: impl Into<String>) -> Self {
        Self {
            market,
            url: url.into(),
            mapping: QuoteMapping::for_market(market),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            persist: true,
        }
    }

    /// Create a configuration from service settings.
    #[must_use]
    pub fn from_settings(
        market: Market,
        url: impl Into<String>,
        settings: &crate::FeedSettings,
    ) -> Self {
        Self {
            reconnect: ReconnectConfig::from_feed_settings(settings),
            heartbeat: HeartbeatConfig::from_feed_settings(settings),
            persist: settings.store_writes_enabled,
            ..Self::new(market, url)
        }
    }

    /// Override the reconnection configuration.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Override the heartbeat configuration.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Override the mapping rule.
    #[must_use]
    pub const fn with_mapping(mut self, mapping: QuoteMapping) -> Self {
        self.mapping = mapping;
        self
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns one feed subscription: connect, liveness, reconnect, ingestion.
pub struct ConnectionManager {
    config: FeedConfig,
    codec: TickerCodec,
    normalizer: QuoteNormalizer,
    store: SnapshotStore,
    cancel: CancellationToken,
    status: Arc<FeedStatus>,
}

impl ConnectionManager {
    /// Create a manager. Cancelling `cancel` shuts the feed down.
    #[must_use]
    pub fn new(config: FeedConfig, store: SnapshotStore, cancel: CancellationToken) -> Self {
        let normalizer = QuoteNormalizer::new(config.market, config.mapping);
        let status = Arc::new(FeedStatus::new(config.market));
        Self {
            config,
            codec: TickerCodec::new(),
            normalizer,
            store,
            cancel,
            status,
        }
    }

    /// Status mirror for health reporting.
    #[must_use]
    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    /// Spawn the connection task and its snapshot writer.
    #[must_use]
    pub fn start(self) -> FeedHandle {
        let market = self.config.market;
        let (quotes, writer) = spawn_writer(market, self.store.clone(), self.config.persist);
        let cancel = self.cancel.clone();
        let status = self.status();
        let task = tokio::spawn(self.run(quotes));

        FeedHandle {
            market,
            cancel,
            status,
            task,
            writer,
        }
    }

    async fn run(self, quotes: QuoteSender) {
        let market = self.config.market;
        let mut state = ConnectionState::new(self.config.reconnect.clone());
        let mut socket: Option<FeedSocket> = None;
        let mut action = state.apply(ConnectionEvent::Start, Instant::now());

        loop {
            self.status.set_phase(state.phase());

            let event = match action {
                ConnectionAction::Connect => match self.connect().await {
                    Ok(ws) => {
                        socket = Some(ws);
                        ConnectionEvent::Opened
                    }
                    Err(event) => event,
                },
                ConnectionAction::ArmHeartbeat => match socket.take() {
                    Some(ws) => {
                        tracing::info!(market = %market, "Ticker feed connected");
                        metrics::set_feed_connected(market, true);
                        let event = self.stream(ws, &mut state, &quotes).await;
                        metrics::set_feed_connected(market, false);
                        event
                    }
                    None => ConnectionEvent::Failed,
                },
                ConnectionAction::Wait(delay) => {
                    self.status.increment_reconnect_attempts();
                    metrics::record_reconnect(market);
                    tracing::info!(
                        market = %market,
                        attempt = state.failed_attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconnecting to ticker feed"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => ConnectionEvent::Stop,
                        () = tokio::time::sleep(delay) => ConnectionEvent::WaitElapsed,
                    }
                }
                ConnectionAction::Close => {
                    if let Some(mut ws) = socket.take() {
                        let _ = ws.close(None).await;
                    }
                    break;
                }
                ConnectionAction::Ignore => {
                    tracing::debug!(market = %market, phase = state.phase().as_str(), "No transition");
                    break;
                }
            };

            action = state.apply(event, Instant::now());
        }

        self.status.set_phase(ConnectionPhase::Shutdown);
        tracing::info!(market = %market, "Ticker feed stopped");
    }

    /// Open the socket. Returns the event to apply when no socket was opened.
    async fn connect(&self) -> Result<FeedSocket, ConnectionEvent> {
        let market = self.config.market;
        tracing::info!(market = %market, url = %self.config.url, "Connecting to ticker feed");

        let result = tokio::select! {
            () = self.cancel.cancelled() => return Err(ConnectionEvent::Stop),
            result = tokio_tungstenite::connect_async(self.config.url.as_str()) => result,
        };

        match result {
            Ok((ws, _response)) => Ok(ws),
            Err(e) => {
                metrics::record_websocket_error(market, "connect");
                tracing::warn!(market = %market, error = %e, "Ticker feed connection failed");
                Err(ConnectionEvent::Failed)
            }
        }
    }

    /// Read the open socket until shutdown or failure.
    async fn stream(
        &self,
        ws: FeedSocket,
        state: &mut ConnectionState,
        quotes: &QuoteSender,
    ) -> ConnectionEvent {
        let market = self.config.market;
        let (mut write, mut read) = ws.split();

        let period = self.config.heartbeat.ping_interval;
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome: Result<(), FeedError> = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break Ok(()),
                _ = heartbeat.tick() => {
                    match state.liveness_mut().on_tick(Instant::now()) {
                        HeartbeatEvent::SendPing => {
                            tracing::trace!(market = %market, "Sending ping");
                            if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                                break Err(e.into());
                            }
                        }
                        HeartbeatEvent::Timeout { idle } => {
                            break Err(FeedError::HeartbeatTimeout(idle));
                        }
                    }
                }
                msg = read.next() => {
                    if matches!(msg, Some(Ok(_))) {
                        state.liveness_mut().record_activity(Instant::now());
                    }
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.ingest(self.codec.decode(&text), quotes);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.ingest(self.codec.decode_binary(&data), quotes);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                break Err(e.into());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(market = %market, frame = ?frame, "Server sent close frame");
                            break Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break Err(e.into()),
                        None => break Err(FeedError::ConnectionClosed),
                    }
                }
            }
        };

        drop(heartbeat);

        match outcome {
            Ok(()) => {
                let _ = write.close().await;
                ConnectionEvent::Stop
            }
            Err(_) if self.cancel.is_cancelled() => ConnectionEvent::Stop,
            Err(e) => {
                metrics::record_websocket_error(market, e.kind());
                tracing::warn!(market = %market, error = %e, "Ticker feed connection lost");
                ConnectionEvent::Failed
            }
        }
    }

    /// Normalize every element of one payload and hand valid quotes to the writer.
    fn ingest(&self, decoded: Result<Vec<serde_json::Value>, CodecError>, quotes: &QuoteSender) {
        let market = self.config.market;
        self.status.increment_messages();
        metrics::record_payload_received(market);

        let elements = match decoded {
            Ok(elements) => elements,
            Err(e) => {
                metrics::record_decode_error(market);
                tracing::warn!(market = %market, error = %e, "Dropping undecodable payload");
                return;
            }
        };

        for element in elements {
            let normalized = RawTickerEvent::from_value(element)
                .map_err(ValidationError::from)
                .and_then(|raw| self.normalizer.normalize(&raw));

            match normalized {
                Ok(quote) => {
                    self.status.increment_quotes();
                    enqueue(market, quotes, quote);
                }
                Err(e) => {
                    metrics::record_quote_rejected(market, e.reason());
                    tracing::debug!(market = %market, error = %e, "Skipping invalid ticker");
                }
            }
        }
    }
}

// =============================================================================
// Feed Handle
// =============================================================================

/// Handle to a running feed.
pub struct FeedHandle {
    market: Market,
    cancel: CancellationToken,
    status: Arc<FeedStatus>,
    task: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl FeedHandle {
    /// Market of the feed.
    #[must_use]
    pub const fn market(&self) -> Market {
        self.market
    }

    /// Status mirror of the feed.
    #[must_use]
    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    /// Request shutdown. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the connection task to stop and the writer to drain.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(market = %self.market, error = %e, "Ticker feed task failed");
        }
        if let Err(e) = self.writer.await {
            tracing::error!(market = %self.market, error = %e, "Snapshot writer task failed");
        }
    }
}
