#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::{Candle, Error, MarketDataSource, Notifier, Result};
use engine::{AlertFormatter, EngineSettings, SignalEngine};
use registry::{RegistryConfig, SignalRegistry};
use strategy::{EvaluatorConfig, TrendMomentumEvaluator};

/// Zigzag uptrend in pips from 1.1000: last close 1.1050, EMA20 = 1.1020, RSI14 ≈ 55.
pub const UPTREND_PIPS: [i32; 20] = [
    -10, 10, -21, 16, -14, 23, -8, 29, -2, 35, 5, 42, 11, 48, 17, 54, 24, 61, 30, 50,
];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn candles_from_closes(first_open_time: DateTime<Utc>, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close - 0.0001 } else { closes[i - 1] };
            Candle {
                open_time: first_open_time + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.0001,
                low: open.min(close) - 0.0001,
                close,
                volume: None,
            }
        })
        .collect()
}

/// Twenty closed M1 candles ending just before `now`, satisfying all bullish conditions.
pub fn bullish_window(now: DateTime<Utc>) -> Vec<Candle> {
    let closes: Vec<f64> = UPTREND_PIPS
        .iter()
        .map(|&p| 1.1000 + p as f64 * 0.0001)
        .collect();
    candles_from_closes(now - chrono::Duration::minutes(20), &closes)
}

/// Two closed candles, the newest closing at `close`.
pub fn latest_close(now: DateTime<Utc>, close: f64) -> Vec<Candle> {
    candles_from_closes(now - chrono::Duration::minutes(2), &[1.1050, close])
}

/// In-memory feed returning whatever was last scripted per symbol.
#[derive(Default)]
pub struct ScriptedSource {
    windows: Mutex<HashMap<String, Option<Vec<Candle>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, symbol: &str, candles: Vec<Candle>) {
        self.windows
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Some(candles));
    }

    pub fn fail(&self, symbol: &str) {
        self.windows.lock().unwrap().insert(symbol.to_string(), None);
    }

    /// Make every fetch for `symbol` take `delay` before answering.
    pub fn slow(&self, symbol: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(symbol.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn fetch(&self, symbol: &str, _granularity_secs: u32, _count: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(symbol).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.windows.lock().unwrap().get(symbol) {
            Some(Some(candles)) => Ok(candles.clone()),
            _ => Err(Error::DataUnavailable(format!("{symbol}: feed unreachable"))),
        }
    }
}

/// Feed that never answers.
pub struct HangingSource;

#[async_trait]
impl MarketDataSource for HangingSource {
    async fn fetch(&self, _symbol: &str, _granularity_secs: u32, _count: usize) -> Result<Vec<Candle>> {
        std::future::pending().await
    }
}

/// Notifier that records every message and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Notify("chat unreachable".into()));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub fn settings(symbols: &[&str]) -> EngineSettings {
    EngineSettings {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        granularity_secs: 60,
        history_candles: 50,
        hold: chrono::Duration::minutes(1),
        fetch_timeout: Duration::from_secs(10),
    }
}

pub fn engine(
    symbols: &[&str],
    source: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn Notifier>,
) -> SignalEngine {
    let evaluator = TrendMomentumEvaluator::new(&EvaluatorConfig::default(), 20).unwrap();
    SignalEngine::new(
        settings(symbols),
        source,
        Arc::new(evaluator),
        notifier,
        SignalRegistry::new(RegistryConfig {
            cooldown: chrono::Duration::minutes(60),
        }),
        AlertFormatter::new(0, 60).unwrap(),
    )
}
