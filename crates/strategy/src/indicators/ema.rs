/// Exponential moving average over closing prices.
///
/// Seeded with the simple average of the first `period` closes, then smoothed
/// with `k = 2 / (period + 1)` across the rest of the series. The first
/// `period - 1` points have no defined value.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    /// EMA at the last close (oldest first). `None` with fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let k = 2.0 / (self.period as f64 + 1.0);
        let seed = closes[..self.period].iter().sum::<f64>() / self.period as f64;
        let value = closes[self.period..]
            .iter()
            .fold(seed, |ema, &price| price * k + ema * (1.0 - k));
        Some(value)
    }
}
