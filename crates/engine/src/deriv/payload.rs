use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{Candle, Error, Result};

pub(crate) fn authorize_request(token: &str, req_id: u64) -> Value {
    json!({ "authorize": token, "req_id": req_id })
}

pub(crate) fn candles_request(symbol: &str, granularity_secs: u32, count: usize, req_id: u64) -> Value {
    json!({
        "ticks_history": symbol,
        "style": "candles",
        "granularity": granularity_secs,
        "count": count,
        "end": "latest",
        "adjust_start_time": 1,
        "req_id": req_id,
    })
}

/// The broker's error message, if the reply carries one.
pub(crate) fn broker_error(reply: &Value) -> Option<String> {
    let error = reply.get("error")?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Some(match error.get("code").and_then(Value::as_str) {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    })
}

pub(crate) fn req_id(reply: &Value) -> Option<u64> {
    reply.get("req_id").and_then(Value::as_u64)
}

// ─── Candle payload ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CandlesReply {
    candles: Vec<RawCandle>,
}

#[derive(Deserialize)]
struct RawCandle {
    epoch: i64,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
}

/// Prices arrive as JSON numbers, occasionally as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Price {
    Number(f64),
    Text(String),
}

impl Price {
    fn value(&self) -> Result<f64> {
        match self {
            Price::Number(v) => Ok(*v),
            Price::Text(s) => s
                .parse()
                .map_err(|_| Error::DataUnavailable(format!("non-numeric price '{s}'"))),
        }
    }
}

/// Parse a `candles` reply into typed candles, oldest first.
pub(crate) fn parse_candles(reply: &Value) -> Result<Vec<Candle>> {
    let parsed = CandlesReply::deserialize(reply)
        .map_err(|e| Error::DataUnavailable(format!("malformed candles payload: {e}")))?;

    parsed
        .candles
        .into_iter()
        .map(|raw| {
            let open_time = Utc
                .timestamp_opt(raw.epoch, 0)
                .single()
                .ok_or_else(|| Error::DataUnavailable(format!("invalid epoch {}", raw.epoch)))?;
            Ok(Candle {
                open_time,
                open: raw.open.value()?,
                high: raw.high.value()?,
                low: raw.low.value()?,
                close: raw.close.value()?,
                volume: None,
            })
        })
        .collect()
}

/// Drop a still-forming trailing candle and keep the newest `count`.
pub(crate) fn closed_only(
    mut candles: Vec<Candle>,
    granularity_secs: u32,
    now: DateTime<Utc>,
    count: usize,
) -> Vec<Candle> {
    let span = chrono::Duration::seconds(i64::from(granularity_secs));
    candles.retain(|c| c.open_time + span <= now);
    let excess = candles.len().saturating_sub(count);
    candles.drain(..excess);
    candles
}
