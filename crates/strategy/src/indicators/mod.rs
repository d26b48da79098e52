pub mod ema;
pub mod rsi;

pub use ema::EmaIndicator;
pub use rsi::RsiIndicator;
