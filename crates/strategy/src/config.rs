use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Indicator parameters for the trend/momentum evaluator (TOML).
///
/// Example `config/evaluator.toml`:
/// ```toml
/// ema_period = 20
/// rsi_period = 14
/// overbought = 70.0
/// oversold = 30.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            rsi_period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl EvaluatorConfig {
    /// Load from a TOML file. Keys left out keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read evaluator config at '{path}': {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Invalid evaluator config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Smallest window on which both indicators are defined.
    pub fn required_window(&self) -> usize {
        self.ema_period.max(self.rsi_period + 1)
    }

    fn validate(&self) -> Result<()> {
        if self.ema_period == 0 {
            return Err(Error::Config("ema_period must be >= 1".into()));
        }
        if self.rsi_period < 2 {
            return Err(Error::Config("rsi_period must be >= 2".into()));
        }
        if !(0.0..=100.0).contains(&self.oversold)
            || !(0.0..=100.0).contains(&self.overbought)
            || self.oversold >= self.overbought
        {
            return Err(Error::Config(format!(
                "RSI bands must satisfy 0 <= oversold < overbought <= 100, got {}/{}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}
