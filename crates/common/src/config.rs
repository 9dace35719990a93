/// Which `DirectionPredictor` the binary wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorKind {
    /// Chat-completions model behind `LLM_BASE_URL`.
    Llm,
    /// Always answers neutral; useful without an API key.
    Neutral,
}

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Predictor
    pub predictor: PredictorKind,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,

    // Market data
    /// Base URL of the candle gateway. `None` runs against the simulated market.
    pub market_data_url: Option<String>,
    pub is_demo: bool,

    // Signals
    pub min_confidence: f64,
    pub signal_interval_secs: u64,
    pub candles_count: usize,
    pub pair_delay_ms: u64,
    pub call_timeout_secs: u64,

    // API
    pub api_port: u16,

    // Scan universe file path
    pub universe_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let predictor = match optional_env("PREDICTOR")
            .unwrap_or_else(|| "llm".to_string())
            .to_lowercase()
            .as_str()
        {
            "llm" => PredictorKind::Llm,
            "neutral" => PredictorKind::Neutral,
            other => panic!("ERROR: PREDICTOR must be 'llm' or 'neutral', got: '{other}'"),
        };

        let llm_api_key = match predictor {
            PredictorKind::Llm => required_env("LLM_API_KEY"),
            PredictorKind::Neutral => optional_env("LLM_API_KEY").unwrap_or_default(),
        };

        let min_confidence: f64 = parsed_env("MIN_CONFIDENCE", 0.7);
        if !(0.0..=1.0).contains(&min_confidence) {
            panic!("ERROR: MIN_CONFIDENCE must be within [0, 1], got: {min_confidence}");
        }

        Config {
            predictor,
            llm_api_key,
            llm_model: optional_env("LLM_MODEL")
                .unwrap_or_else(|| "llama-3.3-70b-versatile".to_string()),
            llm_base_url: optional_env("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
            market_data_url: optional_env("MARKET_DATA_URL").filter(|v| !v.trim().is_empty()),
            is_demo: optional_env("IS_DEMO")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            min_confidence,
            signal_interval_secs: parsed_env("SIGNAL_INTERVAL", 300),
            candles_count: parsed_env("CANDLES_COUNT", 100),
            pair_delay_ms: parsed_env("PAIR_DELAY_MS", 1000),
            call_timeout_secs: parsed_env("CALL_TIMEOUT_SECS", 30),
            api_port: parsed_env("API_PORT", 8000),
            universe_config_path: optional_env("UNIVERSE_CONFIG_PATH")
                .unwrap_or_else(|| "config/universe.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse an optional variable, panicking on a present but malformed value.
fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Environment variable '{key}' has an invalid value: '{raw}'")),
        None => default,
    }
}
