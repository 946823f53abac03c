use super::{OcrRequest, Recognition};
use crate::{traits::OcrEngine, OcrError, OcrMethod};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug, Clone, Serialize)]
struct DetailOcrRequest<'a> {
    image_base64: String,
    languages: &'a [String],
    paragraph: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct DetailOcrResponse {
    #[serde(default)]
    results: Vec<DetailOcrSegment>,
    #[serde(default)]
    gpu: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct DetailOcrSegment {
    #[serde(default)]
    text: Option<String>,
    /// 0-1.
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    gpu: bool,
}

#[derive(Debug, Clone)]
pub struct DetailEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Language codes understood by the service, e.g. `de`, `en`.
    pub languages: Vec<String>,
}

impl DetailEndpointConfig {
    /// Returns `None` when the endpoint is blank.
    pub fn new(
        endpoint: impl AsRef<str>,
        api_key: Option<String>,
        languages: Vec<String>,
    ) -> Option<Self> {
        let endpoint = endpoint.as_ref().trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = api_key.and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Some(Self {
            endpoint,
            api_key,
            languages,
        })
    }
}

/// Paragraph-aware recognition service reached over HTTP. Only usable when the
/// service reports a GPU and GPU use is enabled.
#[derive(Debug, Clone)]
pub struct RemoteDetailEngine {
    client: Client,
    config: DetailEndpointConfig,
    gpu: bool,
}

impl RemoteDetailEngine {
    pub fn new(client: Client, config: DetailEndpointConfig, gpu: bool) -> Self {
        Self { client, config, gpu }
    }

    /// Asks `<endpoint>/health` whether a GPU is present. Any failure, or a
    /// CPU-only service, leaves the engine unavailable.
    pub async fn probe(client: Client, config: DetailEndpointConfig, use_gpu: bool) -> Option<Self> {
        if !use_gpu {
            tracing::info!("gpu use disabled; detail ocr engine not used");
            return None;
        }

        let health_url = format!("{}/health", config.endpoint);
        let response = match client.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(url = %health_url, status = %response.status(), "detail ocr health check failed");
                return None;
            }
            Err(error) => {
                tracing::warn!(url = %health_url, %error, "detail ocr service unreachable");
                return None;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) if health.gpu => {
                tracing::info!(endpoint = %config.endpoint, "detail ocr engine available with gpu");
                Some(Self::new(client, config, true))
            }
            Ok(_) => {
                tracing::info!(endpoint = %config.endpoint, "detail ocr service has no gpu; not used");
                None
            }
            Err(error) => {
                tracing::warn!(%error, "detail ocr health payload unreadable");
                None
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl OcrEngine for RemoteDetailEngine {
    fn method(&self) -> OcrMethod {
        OcrMethod::Detail
    }

    async fn extract(
        &self,
        image: &DynamicImage,
        _request: &OcrRequest,
    ) -> Result<Recognition, OcrError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let payload = DetailOcrRequest {
            image_base64: STANDARD.encode(png),
            languages: &self.config.languages,
            paragraph: true,
        };

        let mut request = self
            .client
            .post(format!("{}/ocr", self.config.endpoint))
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(OcrError::EngineFailed(format!(
                "detail ocr request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: DetailOcrResponse = response.json().await?;
        Ok(payload_to_recognition(&payload, self.gpu))
    }
}

fn payload_to_recognition(payload: &DetailOcrResponse, gpu: bool) -> Recognition {
    let mut texts = Vec::new();
    let mut confidences = Vec::new();

    for segment in &payload.results {
        if let Some(text) = segment.text.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
            texts.push(text.to_string());
        }
        if let Some(confidence) = segment.confidence {
            confidences.push(confidence * 100.0);
        }
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    Recognition {
        text: texts.join("\n"),
        confidence,
        gpu_used: payload.gpu.unwrap_or(gpu),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_segments_join_and_average() -> Result<(), serde_json::Error> {
        let payload: DetailOcrResponse = serde_json::from_value(serde_json::json!({
            "results": [
                {"text": "Lieber Bruder,", "confidence": 0.8},
                {"text": "  ", "confidence": 0.4},
                {"text": "wie geht es dir", "confidence": 0.6}
            ],
            "gpu": true
        }))?;

        let recognition = payload_to_recognition(&payload, false);
        assert_eq!(recognition.text, "Lieber Bruder,\nwie geht es dir");
        assert!((recognition.confidence - 60.0).abs() < 1e-3);
        assert!(recognition.gpu_used);
        Ok(())
    }

    #[test]
    fn empty_payload_is_zero_confidence() -> Result<(), serde_json::Error> {
        let payload: DetailOcrResponse = serde_json::from_value(serde_json::json!({}))?;
        let recognition = payload_to_recognition(&payload, true);
        assert!(recognition.text.is_empty());
        assert_eq!(recognition.confidence, 0.0);
        assert!(recognition.gpu_used);
        Ok(())
    }

    #[test]
    fn blank_endpoint_disables_config() {
        assert!(DetailEndpointConfig::new("  ", None, vec![]).is_none());
        let config = DetailEndpointConfig::new("http://ocr:8080/", Some(" ".into()), vec!["de".into()]);
        let config = config.map(|c| (c.endpoint, c.api_key));
        assert_eq!(config, Some(("http://ocr:8080".to_string(), None)));
    }

    #[tokio::test]
    async fn probe_without_gpu_use_returns_none() {
        let config = DetailEndpointConfig::new("http://127.0.0.1:9", None, vec![]);
        let engine = match config {
            Some(config) => RemoteDetailEngine::probe(Client::new(), config, false).await,
            None => None,
        };
        assert!(engine.is_none());
    }
}
