//! Prompt construction and response parsing for the chat model.

use serde_json::Value;

use common::{
    timeframe_display, Candle, Direction, IndicatorSet, Prediction, DEFAULT_EXPIRE_SECONDS,
};

pub const SYSTEM_PROMPT: &str =
    "You are a professional trader. Give precise, well-reasoned short-term forecasts.";

/// How many trailing candles feed the price-change summary.
const RECENT_WINDOW: usize = 20;
/// Look-back steps reported in the price-change summary.
const CHANGE_STEPS: usize = 5;

/// Percentage change of the latest close against each of the previous
/// `CHANGE_STEPS` closes, rounded to two decimals. Steps that reach past the
/// recent window are skipped.
pub fn price_changes(candles: &[Candle]) -> Vec<f64> {
    let recent = &candles[candles.len().saturating_sub(RECENT_WINDOW)..];
    let Some(last) = recent.last() else {
        return Vec::new();
    };

    (1..=CHANGE_STEPS)
        .filter(|&i| recent.len() > i)
        .filter_map(|i| {
            let base = recent[recent.len() - 1 - i].close;
            if base == 0.0 {
                return None;
            }
            let pct = (last.close - base) / base * 100.0;
            Some((pct * 100.0).round() / 100.0)
        })
        .collect()
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "n/a".to_string())
}

pub fn build_prompt(
    asset: &str,
    timeframe: u32,
    candles: &[Candle],
    indicators: &IndicatorSet,
) -> String {
    let trend = indicators
        .trend
        .map(|t| t.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let changes = price_changes(candles);

    format!(
        "Analyse the following market data and give a forecast.\n\
         \n\
         Asset: {asset}\n\
         Timeframe: {timeframe} seconds ({tf_text})\n\
         \n\
         Technical indicators:\n\
         - Current price: {price}\n\
         - SMA 10: {sma_short}\n\
         - SMA 30: {sma_long}\n\
         - RSI: {rsi}\n\
         - MACD: {macd}\n\
         - Signal line: {signal}\n\
         - Trend: {trend}\n\
         \n\
         Price change (%) of the latest close versus the previous periods:\n\
         {changes:?}\n\
         \n\
         Reply with JSON only:\n\
         {{\n\
           \"direction\": \"up\" or \"down\",\n\
           \"confidence\": number from 0 to 1,\n\
           \"reason\": \"short explanation\",\n\
           \"entry_price\": suggested entry price,\n\
           \"stop_loss\": suggested stop loss,\n\
           \"take_profit\": suggested take profit,\n\
           \"time_to_expire\": suggested expiry in seconds\n\
         }}\n\
         \n\
         Confidence must be an honest probability estimate.",
        tf_text = timeframe_display(timeframe),
        price = fmt_opt(indicators.current_price),
        sma_short = fmt_opt(indicators.sma_short),
        sma_long = fmt_opt(indicators.sma_long),
        rsi = fmt_opt(indicators.rsi),
        macd = fmt_opt(indicators.macd),
        signal = fmt_opt(indicators.macd_signal),
    )
}

/// Turn the model's free-text answer into a `Prediction`.
///
/// The JSON object is taken from the first `{` to the last `}`. Missing or
/// malformed fields fall back to neutral defaults; an answer with no JSON
/// object at all becomes a neutral prediction entered at `current_price`.
pub fn parse_response(content: &str, current_price: Option<f64>) -> Prediction {
    let object = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => {
            let mut p = Prediction::neutral("Model answer contained no analysis");
            p.entry_price = current_price;
            return p;
        }
    };

    let value: Value = match serde_json::from_str(object) {
        Ok(v) => v,
        Err(e) => {
            let mut p = Prediction::neutral(format!("Unparseable model answer: {e}"));
            p.entry_price = current_price;
            return p;
        }
    };

    let direction = value
        .get("direction")
        .and_then(Value::as_str)
        .map(Direction::parse_lenient)
        .unwrap_or_default();

    let confidence = number(&value, "confidence").unwrap_or(0.5);
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.5
    };

    let expire_seconds = number(&value, "time_to_expire")
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round().min(u32::MAX as f64) as u32)
        .unwrap_or(DEFAULT_EXPIRE_SECONDS);

    Prediction {
        direction,
        confidence,
        rationale: value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        entry_price: number(&value, "entry_price"),
        stop_loss: number(&value, "stop_loss"),
        take_profit: number(&value, "take_profit"),
        expire_seconds,
    }
}

/// Numbers sometimes come back quoted.
fn number(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
