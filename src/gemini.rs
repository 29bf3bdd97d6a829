//! Gemini provider for the [`VisionModel`] seam.
//!
//! Talks to the `generateContent` REST endpoint directly over [`reqwest`]
//! rather than through an SDK: the request is one JSON body and the reply
//! one JSON tree, and owning the wire shape keeps the error surface (HTTP
//! status, block reason, empty candidates) fully in our hands.

use crate::config::ScanConfig;
use crate::pipeline::normalize::EncodedImage;
use crate::pipeline::vision::{ModelCallError, ModelReply, ReplyCandidate, VisionModel};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Safety categories sent with every request, all at medium-and-above.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Client for Google's Gemini `generateContent` API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request_body(&self, prompt: &str, image: Option<&EncodedImage>) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": image.data,
                }
            }));
        }

        let safety_settings: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": "BLOCK_MEDIUM_AND_ABOVE",
                })
            })
            .collect();

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": self.top_p,
                "topK": self.top_k,
                "maxOutputTokens": self.max_output_tokens,
            },
            "safetySettings": safety_settings,
        })
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&EncodedImage>,
    ) -> Result<ModelReply, ModelCallError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(prompt, image))
            .send()
            .await
            .map_err(|e| ModelCallError::new(format!("gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelCallError::new(format!(
                "gemini returned HTTP {status}: {body}"
            )));
        }

        let wire: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::new(format!("gemini reply was not valid JSON: {e}")))?;

        // A block reason means the image tripped the safety filters; keep
        // the word "blocked" in the message so classification lands on the
        // content-blocked variant.
        if let Some(feedback) = &wire.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ModelCallError::new(format!(
                    "request blocked by safety filters: {reason}"
                )));
            }
        }

        Ok(ModelReply {
            candidates: wire
                .candidates
                .into_iter()
                .map(|c| ReplyCandidate {
                    parts: c
                        .content
                        .map(|content| {
                            content.parts.into_iter().filter_map(|p| p.text).collect()
                        })
                        .unwrap_or_default(),
                })
                .collect(),
        })
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
struct WirePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}
