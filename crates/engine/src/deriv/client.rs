use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use common::{Candle, Error, MarketDataSource, Result};

use super::payload;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Deriv WebSocket API client used as the market-data feed.
///
/// Authorizes once on `connect` and keeps the socket for subsequent
/// requests. Requests are serialized over the one socket; replies are
/// matched by `req_id`. A transport failure drops the socket and the next
/// request reconnects and re-authorizes.
pub struct DerivClient {
    endpoint: String,
    token: String,
    socket: Mutex<Option<Socket>>,
    next_req_id: AtomicU64,
}

impl DerivClient {
    /// Connect and authorize. A rejected token is a configuration error.
    pub async fn connect(ws_url: &str, app_id: u32, token: impl Into<String>) -> Result<Self> {
        let mut endpoint = Url::parse(ws_url)
            .map_err(|e| Error::Config(format!("invalid DERIV_WS_URL '{ws_url}': {e}")))?;
        endpoint
            .query_pairs_mut()
            .append_pair("app_id", &app_id.to_string());

        let client = Self {
            endpoint: endpoint.to_string(),
            token: token.into(),
            socket: Mutex::new(None),
            next_req_id: AtomicU64::new(1),
        };
        let socket = client.open().await?;
        *client.socket.lock().await = Some(socket);
        Ok(client)
    }

    fn req_id(&self) -> u64 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn open(&self) -> Result<Socket> {
        info!(endpoint = %self.endpoint, "Connecting to Deriv WebSocket API");
        let (mut socket, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| Error::DataUnavailable(format!("Deriv connect failed: {e}")))?;

        let req_id = self.req_id();
        let reply = exchange(&mut socket, payload::authorize_request(&self.token, req_id), req_id).await?;
        if let Some(message) = payload::broker_error(&reply) {
            return Err(Error::Config(format!("Deriv rejected the API token: {message}")));
        }

        let login = reply
            .pointer("/authorize/loginid")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(login, "Deriv session authorized");
        Ok(socket)
    }

    async fn request(&self, body: Value, req_id: u64) -> Result<Value> {
        let mut slot = self.socket.lock().await;
        let mut socket = match slot.take() {
            Some(socket) => socket,
            None => {
                warn!("Deriv socket missing, reconnecting");
                self.open().await?
            }
        };
        // The socket only goes back into the slot after a clean exchange.
        let reply = exchange(&mut socket, body, req_id).await?;
        *slot = Some(socket);
        Ok(reply)
    }
}

/// Send one request and wait for the reply carrying the same `req_id`.
async fn exchange(socket: &mut Socket, body: Value, req_id: u64) -> Result<Value> {
    socket
        .send(Message::Text(body.to_string()))
        .await
        .map_err(|e| Error::DataUnavailable(format!("Deriv send failed: {e}")))?;

    while let Some(msg) = socket.next().await {
        let msg = msg.map_err(|e| Error::DataUnavailable(format!("Deriv read failed: {e}")))?;
        match msg {
            Message::Text(text) => {
                let reply: Value = serde_json::from_str(&text)
                    .map_err(|e| Error::DataUnavailable(format!("unparseable Deriv reply: {e}")))?;
                if payload::req_id(&reply) == Some(req_id) {
                    return Ok(reply);
                }
                debug!(expected = req_id, "Skipping unrelated Deriv message");
            }
            Message::Close(frame) => {
                return Err(Error::DataUnavailable(format!(
                    "Deriv closed the connection: {frame:?}"
                )));
            }
            _ => {} // ping/pong/binary
        }
    }
    Err(Error::DataUnavailable("Deriv connection ended".into()))
}

#[async_trait]
impl MarketDataSource for DerivClient {
    async fn fetch(&self, symbol: &str, granularity_secs: u32, count: usize) -> Result<Vec<Candle>> {
        let req_id = self.req_id();
        // One extra candle: the newest one is usually still forming.
        let body = payload::candles_request(symbol, granularity_secs, count + 1, req_id);
        let reply = self.request(body, req_id).await?;

        if let Some(message) = payload::broker_error(&reply) {
            return Err(Error::DataUnavailable(format!("{symbol}: {message}")));
        }

        let candles = payload::parse_candles(&reply)?;
        let closed = payload::closed_only(candles, granularity_secs, Utc::now(), count);
        debug!(symbol, candles = closed.len(), "Fetched closed candles");
        Ok(closed)
    }
}
