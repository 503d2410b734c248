//! Gemini `generateContent` client for image generation.

use super::{ImageSynthesizer, SynthesisRequest, SynthesizedImage};
use crate::config::AiConfig;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
    /// Set on intermediate "thinking" images, which are not the final result
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// The final image: the last non-thought inline image part across all candidates.
    fn into_image(self) -> Option<InlineData> {
        self.candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter(|part| !part.thought)
            .filter_map(|part| part.inline_data)
            .filter(|data| data.mime_type.starts_with("image/"))
            .last()
    }
}

pub struct GeminiImageSynthesizer {
    client: Client,
    api_base: Url,
    api_key: String,
    model: String,
}

impl GeminiImageSynthesizer {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        // No request timeout: a hanging upstream call holds the request open
        let client = Client::builder().build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.image_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.as_str().trim_end_matches('/'),
            self.model
        )
    }
}

async fn inline_image(path: &Path) -> anyhow::Result<RequestPart> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read reference image {}", path.display()))?;

    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let mime_type = if guessed.type_() == mime_guess::mime::IMAGE {
        guessed.essence_str().to_string()
    } else {
        "image/png".to_string()
    };

    Ok(RequestPart::InlineData {
        inline_data: InlineData {
            mime_type,
            data: STANDARD.encode(bytes),
        },
    })
}

#[async_trait]
impl ImageSynthesizer for GeminiImageSynthesizer {
    #[instrument(skip_all, fields(model = %self.model, aspect_ratio = %request.aspect_ratio, resolution = %request.resolution))]
    async fn generate_image(&self, request: SynthesisRequest) -> anyhow::Result<Option<SynthesizedImage>> {
        let mut parts = vec![RequestPart::Text { text: request.prompt }];
        if let Some(path) = &request.reference_image {
            parts.push(inline_image(path).await?);
        }
        for path in request.additional_reference_images.iter().flatten() {
            parts.push(inline_image(path).await?);
        }
        debug!(reference_count = parts.len() - 1, "Sending image generation request");

        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: request.aspect_ratio,
                    image_size: request.resolution,
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Image generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Image generation API returned an error");
            return Err(anyhow!("Image generation API error: {} - {}", status, body));
        }

        let parsed: GenerateContentResponse = response.json().await.context("Failed to decode image generation response")?;

        let Some(image) = parsed.into_image() else {
            debug!("Image generation response contained no image");
            return Ok(None);
        };

        let data = STANDARD.decode(image.data.as_bytes()).context("Image payload is not valid base64")?;
        Ok(Some(SynthesizedImage {
            data: Bytes::from(data),
            mime_type: image.mime_type,
        }))
    }
}
