use async_trait::async_trait;

use crate::{Candle, IndicatorSet, Prediction, Result};

/// Abstraction over the broker connection that supplies candles.
///
/// `HttpCandleSource` implements this against a REST candle gateway.
/// `SimulatedMarket` implements this for demo mode.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `count` candles for the pair, oldest first.
    /// An empty vector means the source had nothing for this pair.
    async fn get_candles(&self, asset: &str, timeframe: u32, count: usize) -> Result<Vec<Candle>>;

    /// Asset codes the broker currently offers.
    async fn available_assets(&self) -> Result<Vec<String>>;

    /// Whether the underlying connection is currently usable.
    async fn is_connected(&self) -> bool;
}

/// Produces a direction call for a candle series and its indicators.
///
/// Implementations should answer with `Prediction::neutral` when the model
/// output is unusable, and reserve `Err` for transport failures.
#[async_trait]
pub trait DirectionPredictor: Send + Sync {
    async fn predict(
        &self,
        asset: &str,
        timeframe: u32,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Prediction>;
}
