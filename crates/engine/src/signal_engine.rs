use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use common::{
    validate_window, Candle, Config, EngineState, Error, MarketDataSource, Notifier, Result,
    Signal,
};
use registry::SignalRegistry;
use strategy::ConditionEvaluator;

use crate::alerts::AlertFormatter;

/// Candles fetched per signal when reconciling.
const RECONCILE_WINDOW: usize = 2;

/// Engine parameters taken from `Config`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbols: Vec<String>,
    pub granularity_secs: u32,
    /// Candles fetched per symbol on each scan.
    pub history_candles: usize,
    /// How long a signal stays open before it is reconciled.
    pub hold: chrono::Duration,
    pub fetch_timeout: Duration,
}

impl EngineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            symbols: cfg.symbols.clone(),
            granularity_secs: cfg.granularity_secs,
            history_candles: cfg.history_candles,
            hold: cfg.hold,
            fetch_timeout: cfg.fetch_timeout,
        }
    }
}

/// Per-pass counters, logged by the scheduler and asserted in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub evaluated: usize,
    pub opened: usize,
    pub suppressed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub due: usize,
    pub resolved: usize,
    pub deferred: usize,
}

/// Orchestrates detection and reconciliation.
///
/// Fetches run concurrently per symbol; their results are applied to the
/// registry under its mutex so `try_open`, `due_for_reconciliation` and
/// `resolve` never interleave. A failure for one symbol never stops the pass.
pub struct SignalEngine {
    settings: EngineSettings,
    source: Arc<dyn MarketDataSource>,
    evaluator: Arc<dyn ConditionEvaluator>,
    notifier: Arc<dyn Notifier>,
    registry: Mutex<SignalRegistry>,
    alerts: AlertFormatter,
}

impl SignalEngine {
    pub fn new(
        settings: EngineSettings,
        source: Arc<dyn MarketDataSource>,
        evaluator: Arc<dyn ConditionEvaluator>,
        notifier: Arc<dyn Notifier>,
        registry: SignalRegistry,
        alerts: AlertFormatter,
    ) -> Self {
        Self {
            settings,
            source,
            evaluator,
            notifier,
            registry: Mutex::new(registry),
            alerts,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.settings.symbols
    }

    /// Evaluate every symbol and open signals the registry admits.
    pub async fn scan(&self, now: DateTime<Utc>) -> ScanReport {
        let fetches = self.settings.symbols.iter().map(|symbol| async move {
            let window = self.fetch_window(symbol, self.settings.history_candles).await;
            (symbol, window)
        });
        let windows = join_all(fetches).await;

        let mut report = ScanReport::default();
        let mut detections = Vec::new();
        for (symbol, window) in windows {
            match window.and_then(|w| self.evaluator.evaluate(&w)) {
                Ok(result) => {
                    report.evaluated += 1;
                    debug!(
                        symbol = %symbol,
                        score = result.score,
                        total = result.total,
                        bias = %result.bias,
                        "Conditions evaluated"
                    );
                    if result.satisfied {
                        detections.push((symbol, result));
                    }
                }
                Err(e) => {
                    report.skipped += 1;
                    warn!(symbol = %symbol, error = %e, "Skipping symbol this scan");
                }
            }
        }

        let mut opened = Vec::new();
        {
            let mut registry = self.registry.lock().await;
            for (symbol, result) in detections {
                let candidate = Signal::open(symbol.as_str(), result.bias, result.last_close, now)
                    .with_reference_candle(result.candle_open_time);
                match registry.admit(candidate) {
                    Ok(signal) => opened.push((signal, result)),
                    Err(reason) => {
                        report.suppressed += 1;
                        debug!(symbol = %symbol, reason = %reason, "Detection suppressed");
                    }
                }
            }
        }

        report.opened = opened.len();
        for (signal, result) in &opened {
            self.notify(&self.alerts.signal_opened(signal, result)).await;
        }
        report
    }

    /// Resolve every signal whose hold period has elapsed.
    ///
    /// A signal whose fetch fails, or whose market has not closed a candle
    /// since the reference, stays open and is retried next pass.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> ReconcileReport {
        let due = self
            .registry
            .lock()
            .await
            .due_for_reconciliation(now, self.settings.hold);
        let mut report = ReconcileReport {
            due: due.len(),
            ..ReconcileReport::default()
        };
        if due.is_empty() {
            return report;
        }

        let fetches = due.iter().map(|signal| async move {
            let window = self.fetch_window(&signal.symbol, RECONCILE_WINDOW).await;
            (signal, window)
        });
        let windows = join_all(fetches).await;

        let mut resolved = Vec::new();
        {
            let mut registry = self.registry.lock().await;
            for (signal, window) in windows {
                let latest = match window.as_deref().map(<[Candle]>::last) {
                    Ok(Some(candle)) if signal.has_closed_since_reference(candle) => candle.close,
                    Ok(Some(candle)) => {
                        report.deferred += 1;
                        info!(
                            symbol = %signal.symbol,
                            signal_id = %signal.id,
                            latest_candle = %candle.open_time,
                            "No candle closed since the reference; reconciliation deferred"
                        );
                        continue;
                    }
                    Ok(None) => continue, // validate_window guarantees at least two
                    Err(e) => {
                        report.deferred += 1;
                        warn!(
                            symbol = %signal.symbol,
                            signal_id = %signal.id,
                            error = %e,
                            "Reconciliation deferred; signal stays open"
                        );
                        continue;
                    }
                };

                let outcome = signal.judge(latest, now);
                match registry.resolve(&signal.id, outcome) {
                    Ok(done) => resolved.push(done),
                    Err(e) => {
                        error!(signal_id = %signal.id, error = %e, "Failed to resolve signal")
                    }
                }
            }
        }

        report.resolved = resolved.len();
        for signal in &resolved {
            if let Some(outcome) = &signal.outcome {
                info!(
                    symbol = %signal.symbol,
                    signal_id = %signal.id,
                    outcome = %outcome.resolved,
                    reference = signal.reference_close,
                    close = outcome.resolution_close,
                    "Signal outcome"
                );
            }
            if let Some(text) = self.alerts.signal_resolved(signal) {
                self.notify(&text).await;
            }
        }
        report
    }

    /// Send the periodic status message.
    pub async fn heartbeat(&self, state: EngineState, now: DateTime<Utc>) {
        let open = self.registry.lock().await.pending_count();
        let text = self.alerts.heartbeat(state, open, &self.settings.symbols, now);
        self.notify(&text).await;
    }

    pub async fn announce_startup(&self, now: DateTime<Utc>) {
        let text = self.alerts.startup(&self.settings.symbols, now);
        self.notify(&text).await;
    }

    /// Snapshot of the open signals, oldest first.
    pub async fn pending_signals(&self) -> Vec<Signal> {
        self.registry.lock().await.pending()
    }

    /// Deliver `text`; failures are logged and swallowed.
    pub async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            warn!(error = %e, "Failed to deliver notification");
        }
    }

    /// Fetch with a timeout and validate the payload shape.
    async fn fetch_window(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        let fetch = self
            .source
            .fetch(symbol, self.settings.granularity_secs, count);
        let candles = tokio::time::timeout(self.settings.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                Error::DataUnavailable(format!(
                    "{symbol}: fetch timed out after {:?}",
                    self.settings.fetch_timeout
                ))
            })??;
        validate_window(&candles)?;
        Ok(candles)
    }
}
