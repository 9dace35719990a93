/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Computes: MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period).
/// Every EMA is seeded with the first value of its input and carries no bias
/// correction, so the lines are defined from the very first close.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Latest values of the MACD and signal lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast < slow,
            "MACD fast period must be less than slow period"
        );
        Self { fast, slow, signal }
    }

    /// Compute the latest MACD and signal values from close prices (oldest first).
    /// Returns `None` only for an empty slice.
    pub fn compute(&self, closes: &[f64]) -> Option<MacdValue> {
        if closes.is_empty() {
            return None;
        }

        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = ema_series(&macd_line, self.signal);

        Some(MacdValue {
            macd: *macd_line.last()?,
            signal: *signal_line.last()?,
        })
    }
}

/// Exponential moving average over the whole series.
///
/// Smoothing factor is `2 / (period + 1)`; the first output equals the first
/// input.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    let mut prev: Option<f64> = None;
    for &value in data {
        let next = match prev {
            None => value,
            Some(p) => value * k + p * (1.0 - k),
        };
        out.push(next);
        prev = Some(next);
    }
    out
}
