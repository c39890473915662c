//! Snapshot Writer
//!
//! Persists normalized quotes off the connection task. The connection task
//! never waits on the store: it hands quotes to a pending set keyed by
//! [`StoreKey`], and the writer performs one `set` per pending key in the
//! order keys first became pending. A quote arriving for a key that is still
//! pending replaces the queued value in place, so the backlog is bounded by
//! the number of distinct instruments no matter how slow the store is.
//! The writer exits once the sender is dropped and the pending set is drained.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::application::services::SnapshotStore;
use crate::domain::quote::{Market, NormalizedQuote, StoreKey};
use crate::infrastructure::metrics;

#[derive(Debug, Default)]
struct Pending {
    order: VecDeque<StoreKey>,
    latest: HashMap<StoreKey, NormalizedQuote>,
    sender_closed: bool,
    receiver_closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<Pending>,
    notify: Notify,
}

/// Outcome of handing a quote to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The key was not pending; the quote was queued.
    Queued,
    /// A pending quote for the same key was replaced.
    Coalesced,
}

/// Writer is gone; the quote was not queued.
#[derive(Debug, thiserror::Error)]
#[error("snapshot writer stopped")]
pub struct WriterClosed(pub NormalizedQuote);

/// Sending half used by the connection task.
#[derive(Debug)]
pub struct QuoteSender {
    shared: Arc<Shared>,
}

impl QuoteSender {
    /// Queue a quote, replacing any pending quote for the same key.
    ///
    /// # Errors
    ///
    /// Returns the quote back if the receiving side was dropped.
    pub fn send(&self, quote: NormalizedQuote) -> Result<Enqueued, WriterClosed> {
        let outcome = {
            let mut pending = self.shared.pending.lock();
            if pending.receiver_closed {
                return Err(WriterClosed(quote));
            }
            let key = quote.store_key();
            if pending.latest.insert(key.clone(), quote).is_some() {
                Enqueued::Coalesced
            } else {
                pending.order.push_back(key);
                Enqueued::Queued
            }
        };
        self.shared.notify.notify_one();
        Ok(outcome)
    }

    /// Number of keys waiting to be written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().order.len()
    }
}

impl Drop for QuoteSender {
    fn drop(&mut self) {
        self.shared.pending.lock().sender_closed = true;
        self.shared.notify.notify_one();
    }
}

/// Receiving half drained by the writer task.
#[derive(Debug)]
pub struct QuoteReceiver {
    shared: Arc<Shared>,
}

impl QuoteReceiver {
    /// Next pending quote, or `None` once the sender is gone and nothing is left.
    pub async fn recv(&mut self) -> Option<NormalizedQuote> {
        loop {
            {
                let mut pending = self.shared.pending.lock();
                while let Some(key) = pending.order.pop_front() {
                    if let Some(quote) = pending.latest.remove(&key) {
                        return Some(quote);
                    }
                }
                if pending.sender_closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

impl Drop for QuoteReceiver {
    fn drop(&mut self) {
        self.shared.pending.lock().receiver_closed = true;
    }
}

/// Create a connected sender/receiver pair.
#[must_use]
pub fn quote_queue() -> (QuoteSender, QuoteReceiver) {
    let shared = Arc::new(Shared::default());
    (
        QuoteSender {
            shared: Arc::clone(&shared),
        },
        QuoteReceiver { shared },
    )
}

/// Spawn a writer for one feed.
///
/// When `persist` is false quotes are consumed and discarded.
#[must_use]
pub fn spawn_writer(
    market: Market,
    store: SnapshotStore,
    persist: bool,
) -> (QuoteSender, JoinHandle<()>) {
    let (tx, rx) = quote_queue();
    let handle = tokio::spawn(run_writer(market, store, persist, rx));
    (tx, handle)
}

async fn run_writer(market: Market, store: SnapshotStore, persist: bool, mut rx: QuoteReceiver) {
    if !persist {
        tracing::warn!(market = %market, "Store writes disabled for feed");
    }

    let mut written: u64 = 0;
    while let Some(quote) = rx.recv().await {
        if !persist {
            continue;
        }
        store.set(&quote.store_key(), &quote).await;
        written += 1;
    }

    tracing::debug!(market = %market, written, "Snapshot writer drained");
}

/// Hand a quote to the writer, counting replaced values.
pub(crate) fn enqueue(market: Market, quotes: &QuoteSender, quote: NormalizedQuote) {
    match quotes.send(quote) {
        Ok(Enqueued::Queued) => {}
        Ok(Enqueued::Coalesced) => metrics::record_quote_coalesced(market),
        Err(e) => tracing::error!(market = %market, error = %e, "Dropping quote"),
    }
}
