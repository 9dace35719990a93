/// Simple moving average of closing prices.
///
/// Produces nothing until `period` values have been observed, the same
/// warm-up rule a rolling window applies.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    /// Mean of the last `period` closes (oldest first input).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}
