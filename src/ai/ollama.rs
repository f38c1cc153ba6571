use super::{build_analysis, build_listing, caption_from_path, extract_json, AiError, Analysis, Listing};
use crate::config::AiConfig;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

const CAPTION_PROMPT: &str =
    "Describe this image in one short sentence for a product designer. Reply with the sentence only.";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for the Ollama `/api/generate` endpoint
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    caption_model: Option<String>,
}

impl OllamaClient {
    pub fn new(config: &AiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            caption_model: config.caption_model.clone(),
        }
    }

    async fn generate(&self, model: &str, prompt: &str, images: Vec<String>) -> Result<String, AiError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }

    /// Ask the text model for JSON; any failure yields an empty map.
    async fn generate_json(&self, prompt: &str) -> Map<String, Value> {
        match self.generate(&self.model, prompt, Vec::new()).await {
            Ok(text) => extract_json(&text),
            Err(e) => {
                tracing::warn!("LLM request failed, using fallback: {}", e);
                Map::new()
            }
        }
    }

    /// Caption an image with the vision model, falling back to its file name.
    ///
    /// Returns the caption and, when the fallback was used, a warning.
    pub async fn caption(&self, path: &Path) -> (String, Option<String>) {
        let Some(model) = &self.caption_model else {
            return (
                caption_from_path(path),
                Some("Vision model not configured; using filename caption fallback".into()),
            );
        };

        match self.caption_with(model, path).await {
            Ok(caption) if !caption.trim().is_empty() => (caption.trim().to_string(), None),
            Ok(_) => (
                caption_from_path(path),
                Some("Vision model returned no caption; using filename caption fallback".into()),
            ),
            Err(e) => {
                tracing::warn!("Captioning failed for {:?}: {}", path, e);
                (
                    caption_from_path(path),
                    Some("Vision model unavailable; using filename caption fallback".into()),
                )
            }
        }
    }

    async fn caption_with(&self, model: &str, path: &Path) -> Result<String, AiError> {
        let bytes = tokio::fs::read(path).await?;
        let image = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.generate(model, CAPTION_PROMPT, vec![image]).await
    }

    /// Classify the design intent of an image.
    pub async fn analyze_image(&self, path: &Path) -> Analysis {
        let (caption, captioner_warning) = self.caption(path).await;

        let prompt = format!(
            "Return strict JSON only with keys: theme, objects(array), style, mood, target_audience. \
             You are classifying design intent for print-on-demand ecommerce. Caption: {}",
            caption
        );
        let parsed = self.generate_json(&prompt).await;

        build_analysis(&parsed, caption, captioner_warning)
    }

    /// Write listing copy for an analysed image.
    pub async fn generate_listing(&self, analysis: &Analysis) -> Listing {
        let analysis_json = serde_json::to_string(analysis).unwrap_or_default();
        let prompt = format!(
            "Return strict JSON only with keys: title(string), bullets(array of 5 strings), \
             description(string), tags(array of <=10 short strings). Generate natural, \
             human-sounding, Amazon-optimized copy for a POD apparel listing. Input analysis: {}",
            analysis_json
        );
        let parsed = self.generate_json(&prompt).await;

        build_listing(&parsed, analysis)
    }
}
