pub mod clock;
pub mod config;
pub mod error;
pub mod market;
pub mod types;
pub mod universe;

pub use clock::{Clock, SystemClock};
pub use config::{Config, PredictorKind};
pub use error::{Error, Result};
pub use market::{DirectionPredictor, MarketDataSource};
pub use types::*;
pub use universe::{AssetEntry, Universe};
