use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Display names for the assets the scan knows out of the box.
const BUILTIN_NAMES: &[(&str, &str)] = &[
    ("GBPJPY_otc", "GBP/JPY OTC"),
    ("EURUSD_otc", "EUR/USD OTC"),
    ("BTCUSD", "Bitcoin/USD"),
    ("XAUUSD_otc", "Gold/USD OTC"),
    ("SP500_otc", "S&P 500 OTC"),
];

const DEFAULT_TIMEFRAMES: &[u32] = &[60, 300];

/// The asset x timeframe cross-product scanned on every batch (TOML).
///
/// Example `config/universe.toml`:
/// ```toml
/// timeframes = [60, 300]
///
/// [[asset]]
/// code = "EURUSD_otc"
/// name = "EUR/USD OTC"
///
/// [[asset]]
/// code = "BTCUSD"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Universe {
    #[serde(rename = "asset")]
    pub assets: Vec<AssetEntry>,
    /// Candle durations in seconds.
    pub timeframes: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetEntry {
    /// Broker asset code, e.g. "EURUSD_otc".
    pub code: String,
    /// Overrides the built-in display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for Universe {
    fn default() -> Self {
        Self {
            assets: BUILTIN_NAMES
                .iter()
                .map(|(code, _)| AssetEntry {
                    code: (*code).to_string(),
                    name: None,
                })
                .collect(),
            timeframes: DEFAULT_TIMEFRAMES.to_vec(),
        }
    }
}

impl Universe {
    /// Load from a TOML file, falling back to the built-in universe when
    /// the file does not exist. Panics on a file that exists but won't parse.
    pub fn load(path: &str) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path, "Universe file not found, using built-in assets");
                return Self::default();
            }
            Err(e) => panic!("Failed to read universe config at '{path}': {e}"),
        };
        let universe = Self::parse(&content)
            .unwrap_or_else(|e| panic!("Failed to parse universe config at '{path}': {e}"));
        info!(
            assets = universe.assets.len(),
            timeframes = ?universe.timeframes,
            "Loaded scan universe"
        );
        universe
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn asset_codes(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.code.as_str())
    }

    /// Readable name for an asset code; unmapped codes come back unchanged.
    pub fn display_name(&self, code: &str) -> String {
        self.assets
            .iter()
            .find(|a| a.code == code)
            .and_then(|a| a.name.clone())
            .or_else(|| {
                BUILTIN_NAMES
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, name)| (*name).to_string())
            })
            .unwrap_or_else(|| code.to_string())
    }
}
