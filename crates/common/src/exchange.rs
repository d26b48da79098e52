use async_trait::async_trait;

use crate::{Candle, Result};

/// Abstraction over the broker's market-data feed.
///
/// `DerivClient` implements this against the live WebSocket API; tests use
/// scripted in-memory sources. Implementations hold no per-call state: any
/// connection handshake happens once at construction.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the newest `count` closed candles for `symbol`, oldest first.
    ///
    /// Fails with `Error::DataUnavailable` when the feed is unreachable or the
    /// payload is unusable. No retry happens here.
    async fn fetch(&self, symbol: &str, granularity_secs: u32, count: usize) -> Result<Vec<Candle>>;
}

/// Delivery channel for formatted alerts.
///
/// Only the engine and the bootstrap code send through this; a failed send is
/// logged by the caller and never aborts a cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}
