use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use common::{Candle, DirectionPredictor, Error, IndicatorSet, Prediction, Result};

use crate::prompt::{build_prompt, parse_response, SYSTEM_PROMPT};

/// Settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL up to and including the API version, e.g.
    /// `https://api.groq.com/openai/v1`.
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Asks a chat model for the next move of an asset.
pub struct LlmPredictor {
    config: LlmConfig,
    http: Client,
}

impl LlmPredictor {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Prediction(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Prediction("rate limited by model provider".into()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Prediction(format!("HTTP {status}: {text}")));
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| Error::Prediction(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Prediction("completion had no content".into()))
    }
}

#[async_trait]
impl DirectionPredictor for LlmPredictor {
    async fn predict(
        &self,
        asset: &str,
        timeframe: u32,
        candles: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Prediction> {
        let prompt = build_prompt(asset, timeframe, candles, indicators);
        debug!(asset, timeframe, model = %self.config.model, "Requesting prediction");

        let content = self.complete(&prompt).await?;
        let prediction = parse_response(&content, indicators.current_price);
        if prediction.rationale.is_empty() {
            warn!(asset, timeframe, "Model answer carried no rationale");
        }
        Ok(prediction)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let p = LlmPredictor::new(LlmConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn completion_payload_deserializes() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"direction\":\"up\"}"}}]}"#;
        let c: ChatCompletion = serde_json::from_str(raw).unwrap();
        assert_eq!(
            c.choices[0].message.content.as_deref(),
            Some("{\"direction\":\"up\"}")
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_prediction_error() {
        let p = LlmPredictor::new(LlmConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let err = p
            .predict("BTCUSD", 60, &[], &IndicatorSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Prediction(_)));
    }
}
