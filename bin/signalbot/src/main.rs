use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, DirectionPredictor, MarketDataSource, PredictorKind, SystemClock, Universe};
use engine::{GeneratorConfig, HttpCandleSource, SignalGenerator};
use paper::SimulatedMarket;
use predictor::{LlmConfig, LlmPredictor, NeutralPredictor};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let universe = Universe::load(&cfg.universe_config_path);
    info!(
        demo = cfg.is_demo,
        min_confidence = cfg.min_confidence,
        interval_secs = cfg.signal_interval_secs,
        "SignalBot starting"
    );

    // ── Market data (injected based on MARKET_DATA_URL) ───────────────────────
    let source: Arc<dyn MarketDataSource> = match &cfg.market_data_url {
        Some(url) => {
            let timeout = Duration::from_secs(cfg.call_timeout_secs);
            let client = HttpCandleSource::new(url.as_str(), timeout)
                .unwrap_or_else(|e| panic!("Failed to build market data client: {e}"));
            if let Err(e) = client.connect().await {
                warn!(error = %e, "Candle gateway unreachable at startup, will keep retrying each batch");
            }
            Arc::new(client)
        }
        None => {
            info!("No MARKET_DATA_URL set, using SimulatedMarket");
            Arc::new(SimulatedMarket::new())
        }
    };

    // ── Predictor ─────────────────────────────────────────────────────────────
    let predictor: Arc<dyn DirectionPredictor> = match cfg.predictor {
        PredictorKind::Llm => {
            info!(model = %cfg.llm_model, base = %cfg.llm_base_url, "Using LLM predictor");
            let llm = LlmPredictor::new(LlmConfig {
                api_key: cfg.llm_api_key.clone(),
                model: cfg.llm_model.clone(),
                base_url: cfg.llm_base_url.clone(),
                timeout: Duration::from_secs(cfg.call_timeout_secs),
                ..Default::default()
            })
            .unwrap_or_else(|e| panic!("Failed to build LLM client: {e}"));
            Arc::new(llm)
        }
        PredictorKind::Neutral => {
            warn!("PREDICTOR=neutral, no signal will pass the confidence gate");
            Arc::new(NeutralPredictor)
        }
    };

    // ── Signal generator ──────────────────────────────────────────────────────
    let (generator, signals) = SignalGenerator::new(
        GeneratorConfig::from(&cfg),
        universe,
        source.clone(),
        predictor,
        Arc::new(SystemClock),
    );

    // ── API ───────────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        signals,
        source,
        is_demo: cfg.is_demo,
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(generator.run());
    tokio::spawn(api::serve(api_state, cfg.api_port));

    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Exiting.");
}
