use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar from the market data source.
/// Series are always ordered oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Position of the latest close relative to the short moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
        }
    }
}

/// Latest value of every indicator derived from a candle series.
///
/// Numeric fields are `None` when the series is shorter than the
/// indicator's lookback window. All fields are `None` for an empty series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub current_price: Option<f64>,
    pub current_volume: Option<f64>,
    pub trend: Option<Trend>,
}

/// Predicted short-term price direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Direction {
    /// Lenient parse used on model output. Anything unrecognised is neutral.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "up" | "call" | "buy" => Direction::Up,
            "down" | "put" | "sell" => Direction::Down,
            _ => Direction::Neutral,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

/// Default expiry suggested when the predictor does not name one.
pub const DEFAULT_EXPIRE_SECONDS: u32 = 300;

/// Output of a `DirectionPredictor` call. Not retained on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Direction,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub rationale: String,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub expire_seconds: u32,
}

impl Prediction {
    /// The low-confidence fallback returned when a model answer is unusable.
    pub fn neutral(rationale: impl Into<String>) -> Self {
        Self {
            direction: Direction::Neutral,
            confidence: 0.5,
            rationale: rationale.into(),
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            expire_seconds: DEFAULT_EXPIRE_SECONDS,
        }
    }
}

/// An actionable prediction that passed the confidence gate.
/// Built once by the signal generator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub asset: String,
    pub asset_display_name: String,
    pub timeframe_seconds: u32,
    pub timeframe_display: String,
    pub direction: Direction,
    /// Confidence rescaled to 0..=100, one decimal place.
    pub confidence_percent: f64,
    pub rationale: String,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub expire_seconds: u32,
    pub indicators: IndicatorSet,
    pub created_at: DateTime<Local>,
    pub created_at_display: String,
}

/// Counters kept alongside the signal history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorStatus {
    pub last_signal_time: Option<DateTime<Local>>,
    pub total_signals_generated: u64,
}

/// Human-readable timeframe, e.g. `"5 min"` or `"30 sec"`.
pub fn timeframe_display(seconds: u32) -> String {
    if seconds >= 60 {
        format!("{} min", seconds / 60)
    } else {
        format!("{seconds} sec")
    }
}
