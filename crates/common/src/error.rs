use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The market data source returned nothing usable for this pair.
    #[error("No candle data for {asset} ({timeframe}s)")]
    DataUnavailable { asset: String, timeframe: u32 },

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn data_unavailable(asset: impl Into<String>, timeframe: u32) -> Self {
        Error::DataUnavailable {
            asset: asset.into(),
            timeframe,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
