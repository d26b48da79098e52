use tracing::debug;

use common::{Bias, Candle, ConditionResult, Error, Result};

use crate::config::EvaluatorConfig;
use crate::indicators::{EmaIndicator, RsiIndicator};
use crate::ConditionEvaluator;

/// Trend + momentum + candle-direction condition set.
///
/// 1. Bias is Bullish when the last close is above the EMA, else Bearish.
///    Always counts toward the score.
/// 2. RSI is not already stretched against the bias (below overbought for
///    Bullish, above oversold for Bearish).
/// 3. The last candle's body points the same way as the bias.
///
/// A window is satisfied only when all three hold.
#[derive(Debug, Clone)]
pub struct TrendMomentumEvaluator {
    ema: EmaIndicator,
    rsi: RsiIndicator,
    minimum_window: usize,
}

impl TrendMomentumEvaluator {
    pub const TOTAL: u8 = 3;

    pub fn new(cfg: &EvaluatorConfig, minimum_window: usize) -> Result<Self> {
        if minimum_window < cfg.required_window() {
            return Err(Error::Config(format!(
                "MINIMUM_WINDOW ({minimum_window}) is below the {} candles EMA{}/RSI{} need",
                cfg.required_window(),
                cfg.ema_period,
                cfg.rsi_period
            )));
        }
        Ok(Self {
            ema: EmaIndicator::new(cfg.ema_period),
            rsi: RsiIndicator::new(cfg.rsi_period, cfg.overbought, cfg.oversold),
            minimum_window,
        })
    }
}

impl ConditionEvaluator for TrendMomentumEvaluator {
    fn name(&self) -> &str {
        "trend-momentum"
    }

    fn minimum_window(&self) -> usize {
        self.minimum_window
    }

    fn evaluate(&self, window: &[Candle]) -> Result<ConditionResult> {
        let insufficient = || Error::InsufficientData {
            required: self.minimum_window,
            actual: window.len(),
        };
        let last = match window.last() {
            Some(last) if window.len() >= self.minimum_window => last,
            _ => return Err(insufficient()),
        };

        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let ema = self.ema.compute(&closes).ok_or_else(insufficient)?;
        let rsi = self.rsi.compute(&closes).ok_or_else(insufficient)?;

        let bias = if last.close > ema {
            Bias::Bullish
        } else {
            Bias::Bearish
        };

        let momentum_ok = match bias {
            Bias::Bullish => rsi < self.rsi.overbought,
            Bias::Bearish => rsi > self.rsi.oversold,
        };
        let candle_ok = match bias {
            Bias::Bullish => last.is_bullish(),
            Bias::Bearish => last.is_bearish(),
        };

        let score = 1 + u8::from(momentum_ok) + u8::from(candle_ok);
        debug!(close = last.close, ema, rsi, %bias, score, "Window evaluated");

        Ok(ConditionResult {
            satisfied: score >= Self::TOTAL,
            bias,
            score,
            total: Self::TOTAL,
            ema,
            rsi,
            last_close: last.close,
            candle_open_time: last.open_time,
        })
    }
}
