use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

use common::{Candle, MarketDataSource, Result};

/// Assets the simulated broker offers.
pub const SIMULATED_ASSETS: &[&str] = &[
    "GBPJPY_otc",
    "EURUSD_otc",
    "USDJPY_otc",
    "BTCUSD",
    "ETHUSD",
    "XAUUSD_otc",
    "SP500_otc",
    "NASUSD_otc",
];

/// Simulated market data source for demo mode.
///
/// Prices are a deterministic function of the asset and the candle's bucket
/// number, so repeated fetches of the same bucket agree. No network access.
pub struct SimulatedMarket {
    assets: Vec<String>,
    connected: AtomicBool,
    /// Fixed "now" for reproducible series; `None` follows the wall clock.
    anchor: Option<DateTime<Utc>>,
}

impl Default for SimulatedMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMarket {
    pub fn new() -> Self {
        info!(assets = SIMULATED_ASSETS.len(), "SimulatedMarket initialized");
        Self {
            assets: SIMULATED_ASSETS.iter().map(|s| s.to_string()).collect(),
            connected: AtomicBool::new(true),
            anchor: None,
        }
    }

    /// Pin the series to a fixed instant instead of the wall clock.
    pub fn anchored_at(mut self, now: DateTime<Utc>) -> Self {
        self.anchor = Some(now);
        self
    }

    /// Toggle the simulated connection (for health checks and tests).
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    fn now(&self) -> DateTime<Utc> {
        self.anchor.unwrap_or_else(Utc::now)
    }
}

/// Base price and phase derived from the asset code.
fn asset_seed(asset: &str) -> (f64, f64) {
    let h = asset
        .bytes()
        .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let base = 1.0 + (h % 5_000) as f64 / 10.0;
    let phase = (h % 628) as f64 / 100.0;
    (base, phase)
}

fn price_at(base: f64, phase: f64, bucket: i64) -> f64 {
    let t = bucket as f64;
    base * (1.0 + 0.02 * (t * 0.37 + phase).sin() + 0.005 * (t * 1.3).sin())
}

#[async_trait]
impl MarketDataSource for SimulatedMarket {
    async fn get_candles(&self, asset: &str, timeframe: u32, count: usize) -> Result<Vec<Candle>> {
        if !self.connected.load(Ordering::Relaxed)
            || timeframe == 0
            || !self.assets.iter().any(|a| a == asset)
        {
            return Ok(Vec::new());
        }

        let tf = timeframe as i64;
        let (base, phase) = asset_seed(asset);
        // The last closed bucket before now
        let last_bucket = self.now().timestamp() / tf - 1;
        let first_bucket = last_bucket - count as i64 + 1;

        let candles: Vec<Candle> = (first_bucket..=last_bucket)
            .filter_map(|bucket| {
                let open_time = Utc.timestamp_opt(bucket * tf, 0).single()?;
                let open = price_at(base, phase, bucket - 1);
                let close = price_at(base, phase, bucket);
                Some(Candle {
                    open_time,
                    close_time: open_time + chrono::Duration::seconds(tf),
                    open,
                    high: open.max(close) * 1.0005,
                    low: open.min(close) * 0.9995,
                    close,
                    volume: 100.0 + (bucket.rem_euclid(17) * 3) as f64,
                })
            })
            .collect();

        debug!(asset, timeframe, count = candles.len(), "Simulated candles served");
        Ok(candles)
    }

    async fn available_assets(&self) -> Result<Vec<String>> {
        Ok(self.assets.clone())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
