pub mod macd;
pub mod rsi;
pub mod sma;

pub use macd::{ema_series, MacdIndicator, MacdValue};
pub use rsi::RsiIndicator;
pub use sma::SmaIndicator;
