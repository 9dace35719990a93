use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{Candle, Error, MarketDataSource, Result};

/// REST client for a candle gateway sitting in front of the broker session.
///
/// Endpoints:
/// - `GET {base}/candles?asset=..&timeframe=..&count=..` -> `[GatewayCandle]`
/// - `GET {base}/assets` -> `["EURUSD_otc", ...]`
///
/// The connectivity flag tracks the outcome of the most recent request.
/// Every request is bounded by the timeout given at construction.
pub struct HttpCandleSource {
    base_url: String,
    http: Client,
    connected: AtomicBool,
}

impl HttpCandleSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            connected: AtomicBool::new(false),
        })
    }

    /// Probe the gateway once so status reflects reality before the first scan.
    pub async fn connect(&self) -> Result<()> {
        let assets = self.available_assets().await?;
        info!(base = %self.base_url, assets = assets.len(), "Connected to candle gateway");
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let outcome = self.fetch(&url, query).await;
        self.connected.store(outcome.is_ok(), Ordering::Relaxed);
        outcome
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketDataSource for HttpCandleSource {
    async fn get_candles(&self, asset: &str, timeframe: u32, count: usize) -> Result<Vec<Candle>> {
        debug!(asset, timeframe, count, "Fetching candles");
        let raw: Vec<GatewayCandle> = self
            .get_json(
                "/candles",
                &[
                    ("asset", asset.to_string()),
                    ("timeframe", timeframe.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;

        Ok(normalize(raw, timeframe, count))
    }

    async fn available_assets(&self) -> Result<Vec<String>> {
        self.get_json("/assets", &[]).await
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Order oldest first, drop malformed bars and keep the newest `count`.
fn normalize(raw: Vec<GatewayCandle>, timeframe: u32, count: usize) -> Vec<Candle> {
    let mut candles: Vec<Candle> = raw
        .into_iter()
        .filter_map(|c| {
            let candle = c.into_candle(timeframe);
            if candle.is_none() {
                warn!(timeframe, "Dropping candle with invalid timestamp");
            }
            candle
        })
        .collect();
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    let excess = candles.len().saturating_sub(count);
    candles.drain(..excess);
    candles
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GatewayCandle {
    /// Bucket open time, unix seconds.
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl GatewayCandle {
    fn into_candle(self, timeframe: u32) -> Option<Candle> {
        let open_time: DateTime<Utc> = Utc.timestamp_opt(self.time, 0).single()?;
        Some(Candle {
            open_time,
            close_time: open_time + chrono::Duration::seconds(timeframe as i64),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}
