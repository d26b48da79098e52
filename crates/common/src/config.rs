use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Upper bound for timer periods, keeping `Instant + period` in range.
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

pub const DEFAULT_SYMBOLS: [&str; 4] = ["frxEURUSD", "frxUSDJPY", "frxGBPUSD", "frxAUDUSD"];

/// All configuration loaded from environment variables at startup.
/// Missing required variables abort startup with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Broker
    pub deriv_api_token: String,
    pub deriv_app_id: u32,
    pub deriv_ws_url: String,

    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: i64,

    // Market data
    pub symbols: Vec<String>,
    pub granularity_secs: u32,
    pub history_candles: usize,
    pub minimum_window: usize,
    pub fetch_timeout: Duration,

    // Cadence
    pub scan_interval: Duration,
    pub reconcile_interval: Duration,
    pub heartbeat_interval: Duration,

    // Signal policy
    pub cooldown: chrono::Duration,
    pub hold: chrono::Duration,

    // Presentation
    pub display_utc_offset_minutes: i32,

    // Health endpoint
    pub health_port: u16,

    // Evaluator parameter file (optional)
    pub strategy_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let symbols: Vec<String> = match env.optional("SYMBOLS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        if symbols.is_empty() {
            return Err(Error::Config("SYMBOLS must list at least one symbol".into()));
        }

        let minimum_window: usize = env.parsed("MINIMUM_WINDOW", 20)?;
        let history_candles: usize = env.parsed("HISTORY_CANDLES", 50)?;
        if history_candles < minimum_window {
            return Err(Error::Config(format!(
                "HISTORY_CANDLES ({history_candles}) must be >= MINIMUM_WINDOW ({minimum_window})"
            )));
        }

        Ok(Config {
            deriv_api_token: env.required("DERIV_API_TOKEN")?,
            deriv_app_id: env.parsed("DERIV_APP_ID", 1089)?,
            deriv_ws_url: env
                .optional("DERIV_WS_URL")
                .unwrap_or_else(|| "wss://ws.derivws.com/websockets/v3".to_string()),
            telegram_token: env.required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: env.required("TELEGRAM_CHAT_ID")?.trim().parse().map_err(|_| {
                Error::Config("TELEGRAM_CHAT_ID must be a numeric chat id".into())
            })?,
            symbols,
            granularity_secs: env.positive("GRANULARITY_SECONDS", 60)?,
            history_candles,
            minimum_window,
            fetch_timeout: Duration::from_secs(env.positive("FETCH_TIMEOUT_SECS", 10)?),
            scan_interval: env.interval_minutes("SCAN_INTERVAL_MINUTES", 5)?,
            reconcile_interval: env.interval_minutes("RECONCILE_INTERVAL_MINUTES", 1)?,
            heartbeat_interval: env.interval_minutes("HEARTBEAT_INTERVAL_MINUTES", 30)?,
            cooldown: env.policy_minutes("COOLDOWN_MINUTES", 60, 0)?,
            hold: env.policy_minutes("HOLD_MINUTES", 1, 1)?,
            display_utc_offset_minutes: env.parsed("DISPLAY_UTC_OFFSET_MINUTES", -360)?,
            health_port: env.parsed("HEALTH_PORT", 8080)?,
            strategy_config_path: env.optional("STRATEGY_CONFIG_PATH"),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| {
            Error::Config(format!(
                "Required environment variable '{key}' is not set. Check your .env file."
            ))
        })
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + PartialOrd + Default,
    {
        let value = self.parsed(key, default)?;
        if value <= T::default() {
            return Err(Error::Config(format!("{key} must be greater than zero")));
        }
        Ok(value)
    }

    /// A positive whole number of minutes, at most one week, as a timer period.
    fn interval_minutes(&self, key: &str, default: u64) -> Result<Duration> {
        let minutes: u64 = self.positive(key, default)?;
        if minutes > MAX_INTERVAL_MINUTES {
            return Err(Error::Config(format!(
                "{key} must be at most {MAX_INTERVAL_MINUTES} minutes"
            )));
        }
        minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::Config(format!("{key} is too large")))
    }

    /// Minutes as a signal-policy span, at least `min`.
    fn policy_minutes(&self, key: &str, default: i64, min: i64) -> Result<chrono::Duration> {
        let minutes: i64 = self.parsed(key, default)?;
        if minutes < min {
            return Err(Error::Config(format!("{key} must be at least {min}")));
        }
        chrono::Duration::try_minutes(minutes)
            .ok_or_else(|| Error::Config(format!("{key} is too large")))
    }
}
