use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One fixed-interval OHLC price summary as delivered by the market-data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Forex feeds usually carry no volume.
    pub volume: Option<f64>,
}

impl Candle {
    /// Prices are finite, positive and the high/low bracket both open and close.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume.map_or(true, |v| v.is_finite() && v >= 0.0)
    }

    /// Direction of the candle body.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Check a fetched window at the data boundary.
///
/// Rejects malformed candles, non-increasing open times and windows with fewer
/// than two candles. Every rejection is reported as `DataUnavailable` so callers
/// apply the same skip-this-cycle policy as for a network failure.
pub fn validate_window(candles: &[Candle]) -> Result<()> {
    if candles.len() < 2 {
        return Err(Error::DataUnavailable(format!(
            "feed returned {} candle(s), need at least 2",
            candles.len()
        )));
    }
    if let Some(bad) = candles.iter().find(|c| !c.is_well_formed()) {
        return Err(Error::DataUnavailable(format!(
            "malformed candle at {}",
            bad.open_time
        )));
    }
    if candles.windows(2).any(|w| w[1].open_time <= w[0].open_time) {
        return Err(Error::DataUnavailable(
            "candle open times are not strictly increasing".into(),
        ));
    }
    Ok(())
}

/// Directional lean assigned to an evaluation and to the signal it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Bullish => write!(f, "Bullish"),
            Bias::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Result of one evaluation over a candle window. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub satisfied: bool,
    pub bias: Bias,
    /// Number of conditions met.
    pub score: u8,
    /// Number of conditions evaluated.
    pub total: u8,
    /// Indicator readings on the latest closed candle, for alerts and logs.
    pub ema: f64,
    pub rsi: f64,
    pub last_close: f64,
    /// Open time of the candle the readings were taken on.
    pub candle_open_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Open,
    Resolved,
}

/// A raised trading signal awaiting (or having received) its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub bias: Bias,
    pub opened_at: DateTime<Utc>,
    /// Close of the latest closed candle when the signal was opened.
    pub reference_close: f64,
    /// Open time of the candle `reference_close` came from, when known.
    #[serde(default)]
    pub reference_candle_at: Option<DateTime<Utc>>,
    pub state: SignalState,
    pub outcome: Option<Outcome>,
}

impl Signal {
    pub fn open(
        symbol: impl Into<String>,
        bias: Bias,
        reference_close: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            bias,
            opened_at,
            reference_close,
            reference_candle_at: None,
            state: SignalState::Open,
            outcome: None,
        }
    }

    pub fn with_reference_candle(mut self, open_time: DateTime<Utc>) -> Self {
        self.reference_candle_at = Some(open_time);
        self
    }

    /// True when `candle` is newer than the reference candle, so judging
    /// against it compares two different closes.
    pub fn has_closed_since_reference(&self, candle: &Candle) -> bool {
        self.reference_candle_at
            .map_or(true, |reference| candle.open_time > reference)
    }

    /// Earliest instant the signal may be reconciled.
    pub fn due_at(&self, hold: Duration) -> DateTime<Utc> {
        self.opened_at + hold
    }

    /// Win when price moved in the bias direction, otherwise Loss.
    /// An unchanged price counts as a loss.
    pub fn judge(&self, resolution_close: f64, resolved_at: DateTime<Utc>) -> Outcome {
        let won = match self.bias {
            Bias::Bullish => resolution_close > self.reference_close,
            Bias::Bearish => resolution_close < self.reference_close,
        };
        Outcome {
            signal_id: self.id.clone(),
            resolved: if won { OutcomeKind::Win } else { OutcomeKind::Loss },
            resolved_at,
            resolution_close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Win,
    Loss,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Win => write!(f, "Win"),
            OutcomeKind::Loss => write!(f, "Loss"),
        }
    }
}

/// Reconciliation verdict for a signal. Emitted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub signal_id: String,
    pub resolved: OutcomeKind,
    pub resolved_at: DateTime<Utc>,
    pub resolution_close: f64,
}

/// Why the registry refused to open a signal. Expected suppression, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    AlreadyOpen,
    Cooldown { remaining_secs: i64 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::AlreadyOpen => write!(f, "a signal is already open"),
            RejectionReason::Cooldown { remaining_secs } => {
                write!(f, "cooldown active ({remaining_secs}s remaining)")
            }
        }
    }
}

/// Current state of the signal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Commands sent to the scheduler via the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Stop opening new signals; reconciliation keeps running.
    Pause,
    Resume,
}
