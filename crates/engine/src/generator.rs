use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use analysis::IndicatorEngine;
use common::{
    timeframe_display, Clock, DirectionPredictor, Error, GeneratorStatus, MarketDataSource,
    Result, Signal, Universe,
};

use crate::store::SignalStore;

/// Numeric knobs of the generator. `Default` matches the production values.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Predictions below this confidence (0..=1) never become signals.
    pub min_confidence: f64,
    /// Sleep between two batches.
    pub interval: Duration,
    /// Candles requested per pair.
    pub candles_count: usize,
    /// Pause between two consecutive pair evaluations.
    pub pair_delay: Duration,
    /// Upper bound on each candle fetch and each prediction.
    pub call_timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            interval: Duration::from_secs(300),
            candles_count: 100,
            pair_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&common::Config> for GeneratorConfig {
    fn from(cfg: &common::Config) -> Self {
        Self {
            min_confidence: cfg.min_confidence,
            interval: Duration::from_secs(cfg.signal_interval_secs),
            candles_count: cfg.candles_count,
            pair_delay: Duration::from_millis(cfg.pair_delay_ms),
            call_timeout: Duration::from_secs(cfg.call_timeout_secs),
        }
    }
}

/// Cloneable read side of the generator, passed to the API.
///
/// Every query copies out of the history; callers never hold a reference
/// into it.
#[derive(Clone)]
pub struct SignalHandle {
    store: Arc<RwLock<SignalStore>>,
    signal_tx: broadcast::Sender<Signal>,
    clock: Arc<dyn Clock>,
}

impl SignalHandle {
    /// Last `limit` signals, oldest of the slice first.
    pub async fn recent_signals(&self, limit: usize) -> Vec<Signal> {
        self.store.read().await.recent(limit)
    }

    /// Signals created on the current local calendar day.
    pub async fn signals_today(&self) -> Vec<Signal> {
        let today = self.clock.now().date_naive();
        self.store.read().await.on_day(today)
    }

    pub async fn status(&self) -> GeneratorStatus {
        self.store.read().await.status()
    }

    /// Subscribe to every signal as it is generated.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signal_tx.subscribe()
    }
}

/// Scans the asset x timeframe universe and turns confident predictions into
/// signals. The generator is the only writer of the signal history.
pub struct SignalGenerator {
    config: GeneratorConfig,
    universe: Universe,
    source: Arc<dyn MarketDataSource>,
    predictor: Arc<dyn DirectionPredictor>,
    indicators: IndicatorEngine,
    clock: Arc<dyn Clock>,
    store: Arc<RwLock<SignalStore>>,
    signal_tx: broadcast::Sender<Signal>,
}

impl SignalGenerator {
    pub fn new(
        config: GeneratorConfig,
        universe: Universe,
        source: Arc<dyn MarketDataSource>,
        predictor: Arc<dyn DirectionPredictor>,
        clock: Arc<dyn Clock>,
    ) -> (Self, SignalHandle) {
        let store = Arc::new(RwLock::new(SignalStore::default()));
        let (signal_tx, _) = broadcast::channel(256);

        let handle = SignalHandle {
            store: store.clone(),
            signal_tx: signal_tx.clone(),
            clock: clock.clone(),
        };

        let generator = SignalGenerator {
            config,
            universe,
            source,
            predictor,
            indicators: IndicatorEngine::new(),
            clock,
            store,
            signal_tx,
        };

        (generator, handle)
    }

    /// Produce at most one signal for a single pair.
    ///
    /// `Ok(None)` means the prediction fell below the confidence gate.
    /// Missing candles, source failures, predictor failures and timeouts come
    /// back as `Err` and leave the history untouched.
    pub async fn generate_signal(&self, asset: &str, timeframe: u32) -> Result<Option<Signal>> {
        let candles = self
            .bounded(
                "candle fetch",
                self.source
                    .get_candles(asset, timeframe, self.config.candles_count),
            )
            .await?;
        if candles.is_empty() {
            return Err(Error::data_unavailable(asset, timeframe));
        }

        let indicators = self.indicators.compute(&candles);

        let prediction = self
            .bounded(
                "prediction",
                self.predictor
                    .predict(asset, timeframe, &candles, &indicators),
            )
            .await?;

        if prediction.confidence < self.config.min_confidence {
            debug!(
                asset,
                timeframe,
                confidence = prediction.confidence,
                "Prediction below confidence threshold"
            );
            return Ok(None);
        }

        let now = self.clock.now();
        let signal = Signal {
            id: format!("{asset}_{timeframe}_{}", now.format("%Y%m%d_%H%M%S")),
            asset: asset.to_string(),
            asset_display_name: self.universe.display_name(asset),
            timeframe_seconds: timeframe,
            timeframe_display: timeframe_display(timeframe),
            direction: prediction.direction,
            confidence_percent: (prediction.confidence * 1000.0).round() / 10.0,
            rationale: prediction.rationale,
            entry_price: prediction.entry_price,
            stop_loss: prediction.stop_loss,
            take_profit: prediction.take_profit,
            expire_seconds: prediction.expire_seconds,
            indicators,
            created_at: now,
            created_at_display: now.format("%H:%M:%S").to_string(),
        };

        self.store.write().await.push(signal.clone());
        // No subscribers is fine
        let _ = self.signal_tx.send(signal.clone());

        Ok(Some(signal))
    }

    /// Run `generate_signal` over the whole universe, pacing between pairs.
    /// Returns the produced signals, highest confidence first; ties keep
    /// generation order.
    pub async fn generate_all_signals(&self) -> Vec<Signal> {
        let pairs: Vec<(String, u32)> = self
            .universe
            .asset_codes()
            .flat_map(|asset| {
                self.universe
                    .timeframes
                    .iter()
                    .map(move |&tf| (asset.to_string(), tf))
            })
            .collect();

        let mut signals = Vec::new();
        for (i, (asset, timeframe)) in pairs.iter().enumerate() {
            if i > 0 && !self.config.pair_delay.is_zero() {
                tokio::time::sleep(self.config.pair_delay).await;
            }

            match self.generate_signal(asset, *timeframe).await {
                Ok(Some(signal)) => {
                    info!(
                        asset = %signal.asset,
                        timeframe = %signal.timeframe_display,
                        direction = %signal.direction,
                        confidence = signal.confidence_percent,
                        "Signal generated"
                    );
                    signals.push(signal);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        asset = %asset,
                        timeframe = *timeframe,
                        error = %e,
                        "Signal generation failed"
                    );
                }
            }
        }

        signals.sort_by(|a, b| b.confidence_percent.total_cmp(&a.confidence_percent));
        signals
    }

    /// Run the generation loop forever. Call from `tokio::spawn`.
    ///
    /// A batch that panics is logged and the loop carries on at the next
    /// interval.
    pub async fn run(self) {
        info!(
            interval = ?self.config.interval,
            pairs = self.universe.assets.len() * self.universe.timeframes.len(),
            "Signal generator running"
        );

        loop {
            info!(at = %self.clock.now().format("%H:%M:%S"), "Generating signals");
            match AssertUnwindSafe(self.generate_all_signals())
                .catch_unwind()
                .await
            {
                Ok(signals) if signals.is_empty() => info!("No signals this batch"),
                Ok(signals) => info!(count = signals.len(), "Batch complete"),
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(error = %msg, "Signal batch aborted");
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    async fn bounded<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let after = self.config.call_timeout;
        tokio::time::timeout(after, fut)
            .await
            .map_err(|_| Error::Timeout { stage, after })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Utc};
    use common::{AssetEntry, Candle, Direction, IndicatorSet, Prediction};

    // ─── Stubs ───────────────────────────────────────────────────────────────

    struct StubSource {
        candles: usize,
        fail: bool,
    }

    impl StubSource {
        fn with(candles: usize) -> Arc<Self> {
            Arc::new(Self { candles, fail: false })
        }
    }

    #[async_trait]
    impl MarketDataSource for StubSource {
        async fn get_candles(&self, _asset: &str, timeframe: u32, count: usize) -> Result<Vec<Candle>> {
            if self.fail {
                return Err(Error::Http("connection reset".into()));
            }
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            Ok((0..self.candles.min(count))
                .map(|i| {
                    let open_time = start + ChronoDuration::seconds((i as u32 * timeframe) as i64);
                    let close = 100.0 + i as f64;
                    Candle {
                        open_time,
                        close_time: open_time + ChronoDuration::seconds(timeframe as i64),
                        open: close - 0.5,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        volume: 5.0,
                    }
                })
                .collect())
        }

        async fn available_assets(&self) -> Result<Vec<String>> {
            Ok(vec!["EURUSD_otc".into()])
        }

        async fn is_connected(&self) -> bool {
            !self.fail
        }
    }

    /// Returns the scripted confidences in call order, then repeats the last.
    struct StubPredictor {
        confidences: Vec<f64>,
        direction: Direction,
        calls: AtomicUsize,
        panic_on_call: Option<usize>,
    }

    impl StubPredictor {
        fn new(confidences: &[f64]) -> Arc<Self> {
            Arc::new(Self {
                confidences: confidences.to_vec(),
                direction: Direction::Up,
                calls: AtomicUsize::new(0),
                panic_on_call: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectionPredictor for StubPredictor {
        async fn predict(
            &self,
            _asset: &str,
            _timeframe: u32,
            _candles: &[Candle],
            indicators: &IndicatorSet,
        ) -> Result<Prediction> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_call == Some(n) {
                panic!("predictor blew up");
            }
            let confidence = *self
                .confidences
                .get(n)
                .or(self.confidences.last())
                .unwrap_or(&0.0);
            Ok(Prediction {
                direction: self.direction,
                confidence,
                rationale: "stub".into(),
                entry_price: indicators.current_price,
                stop_loss: None,
                take_profit: None,
                expire_seconds: 60,
            })
        }
    }

    struct FailingPredictor;

    #[async_trait]
    impl DirectionPredictor for FailingPredictor {
        async fn predict(
            &self,
            _asset: &str,
            _timeframe: u32,
            _candles: &[Candle],
            _indicators: &IndicatorSet,
        ) -> Result<Prediction> {
            Err(Error::Prediction("model unavailable".into()))
        }
    }

    struct SlowPredictor;

    #[async_trait]
    impl DirectionPredictor for SlowPredictor {
        async fn predict(
            &self,
            _asset: &str,
            _timeframe: u32,
            _candles: &[Candle],
            _indicators: &IndicatorSet,
        ) -> Result<Prediction> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Prediction::neutral("late"))
        }
    }

    struct ManualClock(Mutex<DateTime<Local>>);

    impl ManualClock {
        fn at(y: i32, m: u32, d: u32, h: u32) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            )))
        }

        fn advance(&self, by: ChronoDuration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Local> {
            *self.0.lock().unwrap()
        }
    }

    fn universe(assets: &[&str], timeframes: &[u32]) -> Universe {
        Universe {
            assets: assets
                .iter()
                .map(|a| AssetEntry {
                    code: a.to_string(),
                    name: None,
                })
                .collect(),
            timeframes: timeframes.to_vec(),
        }
    }

    fn fast_config() -> GeneratorConfig {
        GeneratorConfig {
            pair_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn build(
        source: Arc<dyn MarketDataSource>,
        predictor: Arc<dyn DirectionPredictor>,
    ) -> (SignalGenerator, SignalHandle) {
        SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc"], &[60]),
            source,
            predictor,
            ManualClock::at(2024, 6, 10, 9),
        )
    }

    // ─── generate_signal ────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_series_yields_no_signal() {
        let predictor = StubPredictor::new(&[0.99]);
        let (generator, handle) = build(StubSource::with(0), predictor.clone());

        let err = generator.generate_signal("EURUSD_otc", 60).await.unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { timeframe: 60, .. }));
        assert_eq!(predictor.calls(), 0);
        assert!(handle.recent_signals(10).await.is_empty());
    }

    #[tokio::test]
    async fn source_failure_leaves_history_unchanged() {
        let source = Arc::new(StubSource { candles: 50, fail: true });
        let (generator, handle) = build(source, StubPredictor::new(&[0.99]));

        let err = generator.generate_signal("EURUSD_otc", 60).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(handle.status().await.total_signals_generated, 0);
    }

    #[tokio::test]
    async fn below_threshold_is_suppressed() {
        let (generator, handle) = build(StubSource::with(100), StubPredictor::new(&[0.65]));

        let result = generator.generate_signal("EURUSD_otc", 60).await.unwrap();
        assert!(result.is_none());
        assert!(handle.recent_signals(10).await.is_empty());
        assert_eq!(handle.status().await, GeneratorStatus::default());
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let (generator, _handle) = build(StubSource::with(100), StubPredictor::new(&[0.7]));
        let signal = generator.generate_signal("EURUSD_otc", 60).await.unwrap();
        assert_eq!(signal.map(|s| s.confidence_percent), Some(70.0));
    }

    #[tokio::test]
    async fn confident_prediction_becomes_signal() {
        let (generator, handle) = build(StubSource::with(100), StubPredictor::new(&[0.8]));

        let signal = generator
            .generate_signal("EURUSD_otc", 60)
            .await
            .unwrap()
            .expect("signal");

        assert_eq!(signal.confidence_percent, 80.0);
        assert_eq!(signal.direction, Direction::Up);
        assert_eq!(signal.id, "EURUSD_otc_60_20240610_090000");
        assert_eq!(signal.asset_display_name, "EUR/USD OTC");
        assert_eq!(signal.timeframe_display, "1 min");
        assert_eq!(signal.created_at_display, "09:00:00");
        assert_eq!(signal.indicators.current_price, Some(199.0));
        assert_eq!(signal.entry_price, Some(199.0));

        let history = handle.recent_signals(10).await;
        assert_eq!(history, vec![signal.clone()]);

        let status = handle.status().await;
        assert_eq!(status.total_signals_generated, 1);
        assert_eq!(status.last_signal_time, Some(signal.created_at));
    }

    #[tokio::test]
    async fn confidence_percent_rounds_to_one_decimal() {
        let (generator, _handle) = build(StubSource::with(20), StubPredictor::new(&[0.87654]));
        let signal = generator.generate_signal("EURUSD_otc", 60).await.unwrap().unwrap();
        assert_eq!(signal.confidence_percent, 87.7);
    }

    #[tokio::test]
    async fn unmapped_asset_keeps_raw_code() {
        let (generator, _handle) = build(StubSource::with(20), StubPredictor::new(&[0.9]));
        let signal = generator.generate_signal("DOGEUSD", 30).await.unwrap().unwrap();
        assert_eq!(signal.asset_display_name, "DOGEUSD");
        assert_eq!(signal.timeframe_display, "30 sec");
    }

    #[tokio::test]
    async fn predictor_failure_is_typed() {
        let (generator, handle) = build(StubSource::with(50), Arc::new(FailingPredictor));
        let err = generator.generate_signal("EURUSD_otc", 60).await.unwrap_err();
        assert!(matches!(err, Error::Prediction(_)));
        assert!(handle.recent_signals(10).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_predictor_times_out() {
        let (generator, _handle) = build(StubSource::with(50), Arc::new(SlowPredictor));
        let err = generator.generate_signal("EURUSD_otc", 60).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { stage: "prediction", .. }));
    }

    #[tokio::test]
    async fn subscribers_receive_each_generated_signal() {
        let (generator, handle) = build(StubSource::with(50), StubPredictor::new(&[0.9, 0.1, 0.95]));
        let mut rx = handle.subscribe();

        let first = generator.generate_signal("EURUSD_otc", 60).await.unwrap().unwrap();
        assert!(generator.generate_signal("EURUSD_otc", 60).await.unwrap().is_none());
        let third = generator.generate_signal("EURUSD_otc", 300).await.unwrap().unwrap();

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), third);
        assert!(rx.try_recv().is_err());
    }

    // ─── generate_all_signals ────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_is_sorted_by_confidence_descending() {
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc", "BTCUSD", "SP500_otc"], &[60, 300]),
            StubSource::with(40),
            StubPredictor::new(&[0.72, 0.95, 0.5, 0.81, 0.95, 0.9]),
            ManualClock::at(2024, 6, 10, 9),
        );

        let batch = generator.generate_all_signals().await;
        let confidences: Vec<f64> = batch.iter().map(|s| s.confidence_percent).collect();
        assert_eq!(confidences, vec![95.0, 95.0, 90.0, 81.0, 72.0]);

        // Equal confidence keeps generation order: EURUSD 300 before SP500 60
        assert_eq!(batch[0].asset, "EURUSD_otc");
        assert_eq!(batch[0].timeframe_seconds, 300);
        assert_eq!(batch[1].asset, "SP500_otc");
        assert_eq!(batch[1].timeframe_seconds, 60);

        // History stays in creation order
        let history = handle.recent_signals(10).await;
        let created: Vec<f64> = history.iter().map(|s| s.confidence_percent).collect();
        assert_eq!(created, vec![72.0, 95.0, 81.0, 95.0, 90.0]);
    }

    #[tokio::test]
    async fn failing_pairs_do_not_abort_the_batch() {
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc", "BTCUSD"], &[60]),
            Arc::new(StubSource { candles: 10, fail: true }),
            StubPredictor::new(&[0.9]),
            ManualClock::at(2024, 6, 10, 9),
        );
        assert!(generator.generate_all_signals().await.is_empty());
        assert!(handle.recent_signals(10).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_paces_between_pairs() {
        let (generator, _handle) = SignalGenerator::new(
            GeneratorConfig::default(),
            universe(&["EURUSD_otc", "BTCUSD"], &[60, 300]),
            StubSource::with(10),
            StubPredictor::new(&[0.9]),
            ManualClock::at(2024, 6, 10, 9),
        );

        let started = tokio::time::Instant::now();
        let batch = generator.generate_all_signals().await;
        assert_eq!(batch.len(), 4);
        // Three gaps between four pairs
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn history_keeps_newest_hundred_generated_signals() {
        let clock = ManualClock::at(2024, 6, 10, 9);
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc"], &[60]),
            StubSource::with(20),
            StubPredictor::new(&[0.9]),
            clock.clone(),
        );

        let mut ids = Vec::new();
        for _ in 0..crate::store::HISTORY_CAPACITY + 1 {
            let signal = generator.generate_signal("EURUSD_otc", 60).await.unwrap().unwrap();
            ids.push(signal.id);
            clock.advance(ChronoDuration::seconds(1));
        }

        let history = handle.recent_signals(crate::store::HISTORY_CAPACITY).await;
        assert_eq!(history.len(), crate::store::HISTORY_CAPACITY);
        assert_eq!(history.first().unwrap().id, ids[1]);
        assert_eq!(history.last().unwrap().id, *ids.last().unwrap());
        assert_eq!(
            handle.status().await.total_signals_generated,
            crate::store::HISTORY_CAPACITY as u64 + 1
        );
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn signals_today_excludes_prior_days() {
        let clock = ManualClock::at(2024, 6, 10, 22);
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc"], &[60]),
            StubSource::with(20),
            StubPredictor::new(&[0.9]),
            clock.clone(),
        );

        let yesterday = generator.generate_signal("EURUSD_otc", 60).await.unwrap().unwrap();
        clock.advance(ChronoDuration::hours(4));
        let today = generator.generate_signal("EURUSD_otc", 60).await.unwrap().unwrap();

        assert_ne!(yesterday.id, today.id);
        assert_eq!(handle.signals_today().await, vec![today]);
        assert_eq!(handle.recent_signals(10).await.len(), 2);
    }

    // ─── Loop ────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn loop_repeats_after_interval() {
        let predictor = StubPredictor::new(&[0.9]);
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc"], &[60]),
            StubSource::with(20),
            predictor.clone(),
            ManualClock::at(2024, 6, 10, 9),
        );

        let task = tokio::spawn(generator.run());
        tokio::time::sleep(Duration::from_secs(300 * 2 + 1)).await;
        task.abort();

        assert_eq!(predictor.calls(), 3);
        assert_eq!(handle.status().await.total_signals_generated, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_a_panicking_batch() {
        let predictor = Arc::new(StubPredictor {
            confidences: vec![0.9],
            direction: Direction::Down,
            calls: AtomicUsize::new(0),
            panic_on_call: Some(0),
        });
        let (generator, handle) = SignalGenerator::new(
            fast_config(),
            universe(&["EURUSD_otc"], &[60]),
            StubSource::with(20),
            predictor.clone(),
            ManualClock::at(2024, 6, 10, 9),
        );

        let task = tokio::spawn(generator.run());
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!task.is_finished());
        task.abort();

        assert_eq!(predictor.calls(), 2);
        let history = handle.recent_signals(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].direction, Direction::Down);
    }
}
