//! Technical indicators derived from a candle series.

pub mod indicators;

use common::{Candle, IndicatorSet, Trend};
use tracing::debug;

use crate::indicators::{MacdIndicator, RsiIndicator, SmaIndicator};

/// Derives the fixed indicator set reported with every signal.
///
/// Pure computation: the same candles always give the same `IndicatorSet`,
/// and short series produce `None` fields instead of errors.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    sma_short: SmaIndicator,
    sma_long: SmaIndicator,
    rsi: RsiIndicator,
    macd: MacdIndicator,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            sma_short: SmaIndicator::new(Self::SMA_SHORT),
            sma_long: SmaIndicator::new(Self::SMA_LONG),
            rsi: RsiIndicator::new(Self::RSI_PERIOD),
            macd: MacdIndicator::new(12, 26, 9),
        }
    }
}

impl IndicatorEngine {
    pub const SMA_SHORT: usize = 10;
    pub const SMA_LONG: usize = 30;
    pub const RSI_PERIOD: usize = 14;

    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator from candles ordered oldest first.
    /// Values are the latest point of each derived series.
    pub fn compute(&self, candles: &[Candle]) -> IndicatorSet {
        let Some(last) = candles.last() else {
            return IndicatorSet::default();
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let sma_short = self.sma_short.compute(&closes);
        let macd = self.macd.compute(&closes);

        // Before the short window fills, compare against whatever history exists.
        let reference =
            sma_short.unwrap_or_else(|| closes.iter().sum::<f64>() / closes.len() as f64);
        let trend = if last.close > reference {
            Trend::Bullish
        } else {
            Trend::Bearish
        };

        let set = IndicatorSet {
            sma_short,
            sma_long: self.sma_long.compute(&closes),
            rsi: self.rsi.compute(&closes),
            macd: macd.map(|m| m.macd),
            macd_signal: macd.map(|m| m.signal),
            current_price: Some(last.close),
            current_volume: Some(last.volume),
            trend: Some(trend),
        };
        debug!(candles = candles.len(), ?set, "Computed indicators");
        set
    }
}
