/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Returns `None` until at least `period + 1` closed price values are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl RsiIndicator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        assert!(oversold < overbought, "RSI oversold must be below overbought");
        Self { period, overbought, oversold }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period + 1 {
            return None;
        }

        let period = self.period as f64;
        let mut changes = closes.windows(2).map(|w| w[1] - w[0]);

        let (mut avg_gain, mut avg_loss) = changes
            .by_ref()
            .take(self.period)
            .fold((0.0, 0.0), |(gain, loss), c| (gain + c.max(0.0), loss + (-c).max(0.0)));
        avg_gain /= period;
        avg_loss /= period;

        for change in changes {
            avg_gain = (avg_gain * (period - 1.0) + change.max(0.0)) / period;
            avg_loss = (avg_loss * (period - 1.0) + (-change).max(0.0)) / period;
        }

        Some(match (avg_gain == 0.0, avg_loss == 0.0) {
            (true, true) => 50.0, // flat series
            (_, true) => 100.0,
            _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
        })
    }
}
