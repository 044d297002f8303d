use crate::{
    config::GeminiConfig,
    error::{Result, StudioError},
    gemini::ImageGenerator,
    models::{
        gemini::{ErrorEnvelope, GenerateContentResponse},
        GeneratedImage, GenerationCall,
    },
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Clone)]
pub struct GeminiImageClient {
    client: Client,
    api_base: String,
}

impl GeminiImageClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|e| StudioError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{}", trimmed)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Prompt text first, then reference images in declared order.
    pub fn build_payload(call: &GenerationCall) -> Value {
        let mut parts = vec![json!({ "text": call.content.prompt })];
        for image in &call.content.images {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            }));
        }

        let mut image_config = Map::new();
        image_config.insert(
            "imageSize".to_string(),
            Value::String(call.image_config.image_size.clone()),
        );
        if let Some(aspect_ratio) = &call.image_config.aspect_ratio {
            image_config.insert(
                "aspectRatio".to_string(),
                Value::String(aspect_ratio.clone()),
            );
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": Value::Object(image_config),
            }
        })
    }

    fn first_inline_image(response: GenerateContentResponse) -> Result<GeneratedImage> {
        let inline = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.inline_data)
            .find(|inline| !inline.data.is_empty())
            .ok_or(StudioError::NoImageGenerated)?;

        let bytes = BASE64
            .decode(inline.data.as_bytes())
            .map_err(|e| StudioError::UpstreamError(e.to_string()))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: inline.mime_type,
        })
    }

    fn upstream_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            return envelope.error.message;
        }
        if body.trim().is_empty() {
            format!("Upstream request failed with status {}", status)
        } else {
            body.to_string()
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, call: &GenerationCall) -> Result<GeneratedImage> {
        let endpoint = self.endpoint_for_model(&call.model);
        let payload = Self::build_payload(call);

        log::info!(
            "Generating image with model: {} ({} reference image(s))",
            call.model,
            call.content.images.len()
        );

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &call.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("Gemini transport error: {}", e);
                StudioError::UpstreamError(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StudioError::UpstreamError(e.to_string()))?;

        if !status.is_success() {
            let message = Self::upstream_message(status, &body);
            log::error!("Gemini returned {}: {}", status, message);
            return Err(StudioError::UpstreamError(message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| StudioError::UpstreamError(e.to_string()))?;

        Self::first_inline_image(parsed)
    }
}
