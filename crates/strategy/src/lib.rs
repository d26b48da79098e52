pub mod config;
pub mod evaluator;
pub mod indicators;

pub use config::EvaluatorConfig;
pub use evaluator::TrendMomentumEvaluator;

use common::{Candle, ConditionResult, Result};

/// All condition sets must satisfy this trait.
///
/// Implementations are pure functions of the window: no state survives a call.
pub trait ConditionEvaluator: Send + Sync {
    /// Human-readable name of this condition set.
    fn name(&self) -> &str;

    /// Fewest candles `evaluate` accepts.
    fn minimum_window(&self) -> usize;

    /// Evaluate a window of closed candles (oldest first, latest last).
    ///
    /// Fails with `Error::InsufficientData` when the window is shorter than
    /// `minimum_window()`.
    fn evaluate(&self, window: &[Candle]) -> Result<ConditionResult>;
}
