/// RSI (Relative Strength Index) indicator.
///
/// Average gain and average loss are plain means over the last `period`
/// price changes (no Wilder smoothing). The change before the first close
/// counts as zero, so a value exists from `period` closes onwards.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    ///
    /// Returns `None` if there are fewer than `period` values, or when the
    /// window is completely flat (no gains and no losses). A window with gains
    /// but no losses reads 100.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }

        // With exactly `period` closes the window holds `period - 1` changes;
        // the missing one is zero and still counts in the divisor.
        let window = &closes[closes.len().saturating_sub(self.period + 1)..];
        let (gains, losses) = window
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(g, l), change| {
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l - change)
                }
            });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        if avg_loss == 0.0 {
            return if avg_gain > 0.0 { Some(100.0) } else { None };
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_returns_none_when_insufficient_data() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..13).map(|i| 100.0 + i as f64).collect();
        assert!(rsi.compute(&prices).is_none());
    }

    #[test]
    fn rsi_is_defined_from_period_closes() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi.compute(&prices), Some(100.0));
    }

    #[test]
    fn rsi_at_period_closes_divides_by_full_period() {
        // Changes +2, -1, +1 plus the implicit leading zero: gain 3/4, loss 1/4
        let rsi = RsiIndicator::new(4);
        let value = rsi.compute(&[10.0, 12.0, 11.0, 12.0]).unwrap();
        assert!((value - 75.0).abs() < 1e-9, "Expected 75, got {value}");
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3);
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let value = rsi.compute(&prices).unwrap();
        assert!((value - 100.0).abs() < 1e-6, "Expected ~100, got {value}");
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3);
        let prices = vec![14.0, 13.0, 12.0, 11.0, 10.0];
        let value = rsi.compute(&prices).unwrap();
        assert!(value.abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_flat_window_is_undefined() {
        let rsi = RsiIndicator::new(3);
        assert!(rsi.compute(&[5.0; 6]).is_none());
    }

    #[test]
    fn rsi_known_value() {
        // Changes over the last 4 steps: +2, -1, +1, -2 -> gain 3/4, loss 3/4
        let rsi = RsiIndicator::new(4);
        let prices = vec![50.0, 10.0, 12.0, 11.0, 12.0, 10.0];
        let value = rsi.compute(&prices).unwrap();
        assert!((value - 50.0).abs() < 1e-9, "Expected 50, got {value}");
    }

    #[test]
    fn rsi_ignores_changes_outside_the_window() {
        let rsi = RsiIndicator::new(2);
        // The early crash must not count: last two changes are +1, +1
        let prices = vec![100.0, 1.0, 2.0, 3.0];
        assert_eq!(rsi.compute(&prices), Some(100.0));
    }
}
