pub mod llm;
pub mod prompt;

pub use llm::{LlmConfig, LlmPredictor};

use async_trait::async_trait;

use common::{Candle, DirectionPredictor, IndicatorSet, Prediction, Result};

/// Predictor that never takes a side. Every answer is below any sensible
/// confidence gate, so the generator runs but emits nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralPredictor;

#[async_trait]
impl DirectionPredictor for NeutralPredictor {
    async fn predict(
        &self,
        _asset: &str,
        _timeframe: u32,
        _candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Prediction> {
        let mut prediction = Prediction::neutral("No model configured");
        prediction.entry_price = indicators.current_price;
        Ok(prediction)
    }
}
