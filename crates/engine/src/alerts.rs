use chrono::{DateTime, FixedOffset, Timelike, Utc};

use common::{ConditionResult, EngineState, Error, OutcomeKind, Result, Signal};

/// Renders operator-facing alert text.
///
/// Times are shown in a fixed display offset, pairs in `EUR/USD` form.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    offset: FixedOffset,
    granularity_secs: u32,
}

impl AlertFormatter {
    pub fn new(display_utc_offset_minutes: i32, granularity_secs: u32) -> Result<Self> {
        let offset = FixedOffset::east_opt(display_utc_offset_minutes * 60).ok_or_else(|| {
            Error::Config(format!(
                "DISPLAY_UTC_OFFSET_MINUTES out of range: {display_utc_offset_minutes}"
            ))
        })?;
        Ok(Self {
            offset,
            granularity_secs,
        })
    }

    pub fn signal_opened(&self, signal: &Signal, result: &ConditionResult) -> String {
        format!(
            "✅ SIGNAL DETECTED\n\
             Pair: {pair}\n\
             Direction: {bias}\n\
             Conditions: {score}/{total} (EMA {ema:.5}, RSI {rsi:.1})\n\
             Session: {session}\n\
             Timeframe: {timeframe}\n\
             Reference close: {close:.5}\n\
             Entry time: {time}",
            pair = display_symbol(&signal.symbol),
            bias = signal.bias,
            score = result.score,
            total = result.total,
            ema = result.ema,
            rsi = result.rsi,
            session = session_label(signal.opened_at),
            timeframe = timeframe_label(self.granularity_secs),
            close = signal.reference_close,
            time = self.time(signal.opened_at),
        )
    }

    /// Outcome report for a resolved signal. Returns `None` if no outcome is attached.
    pub fn signal_resolved(&self, signal: &Signal) -> Option<String> {
        let outcome = signal.outcome.as_ref()?;
        let verdict = match outcome.resolved {
            OutcomeKind::Win => "✅ Win",
            OutcomeKind::Loss => "❌ Loss",
        };
        Some(format!(
            "📊 SIGNAL RESULT\n\
             Pair: {pair}\n\
             Direction: {bias}\n\
             Result: {verdict}\n\
             Close: {from:.5} → {to:.5}\n\
             Reported at: {time}",
            pair = display_symbol(&signal.symbol),
            bias = signal.bias,
            from = signal.reference_close,
            to = outcome.resolution_close,
            time = self.time(outcome.resolved_at),
        ))
    }

    pub fn heartbeat(
        &self,
        state: EngineState,
        open_signals: usize,
        symbols: &[String],
        now: DateTime<Utc>,
    ) -> String {
        format!(
            "🟢 Heartbeat\n\
             Engine: {state}\n\
             Open signals: {open_signals}\n\
             Watching: {watching} ({timeframe})\n\
             Time: {time}",
            watching = watch_list(symbols),
            timeframe = timeframe_label(self.granularity_secs),
            time = self.time(now),
        )
    }

    pub fn startup(&self, symbols: &[String], now: DateTime<Utc>) -> String {
        format!(
            "🤖 Signal bot online. Broker connection authorized.\n\
             Watching: {watching} ({timeframe})\n\
             Time: {time}",
            watching = watch_list(symbols),
            timeframe = timeframe_label(self.granularity_secs),
            time = self.time(now),
        )
    }

    fn time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M:%S (UTC%:z)")
            .to_string()
    }
}

fn watch_list(symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| display_symbol(s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `frxEURUSD` → `EUR/USD`. Anything else is shown as-is.
pub fn display_symbol(symbol: &str) -> String {
    let pair = symbol.strip_prefix("frx").unwrap_or(symbol);
    if pair.len() == 6 && pair.chars().all(|c| c.is_ascii_uppercase()) {
        format!("{}/{}", &pair[..3], &pair[3..])
    } else {
        symbol.to_string()
    }
}

pub fn timeframe_label(granularity_secs: u32) -> String {
    match granularity_secs {
        60 => "M1".into(),
        300 => "M5".into(),
        900 => "M15".into(),
        1800 => "M30".into(),
        3600 => "H1".into(),
        14400 => "H4".into(),
        86400 => "D1".into(),
        other => format!("{other}s"),
    }
}

/// Forex session by UTC hour.
pub fn session_label(at: DateTime<Utc>) -> &'static str {
    match at.hour() {
        7..=11 => "European",
        12..=15 => "European/American overlap",
        16..=21 => "American",
        _ => "Asian",
    }
}
