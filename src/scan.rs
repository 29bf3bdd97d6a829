//! Scan orchestration: validate, normalise, describe, enrich.
//!
//! [`Scanner`] owns the pipeline end to end. The contract that shapes
//! everything here: **a scan that identified a description never fails just
//! because enrichment did**. Vision-stage failures propagate; lookup-stage
//! failures are logged and the response degrades to
//! [`DataSource::GeminiOnly`] with the raw description intact, so the app
//! can still show the user what the model saw.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::pipeline::normalize;
use crate::pipeline::vision::{self, VisionModel};
use crate::scryfall::{CardCatalog, CardPayload};
use serde::Serialize;
use std::sync::Arc;

/// A validated-enough upload: raw bytes plus the declared content type.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Where the response's card information came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    /// Vision plus a successful card-database match.
    #[serde(rename = "scryfall")]
    Scryfall,
    /// Vision only; the database lookup was skipped or failed.
    #[serde(rename = "gemini_only")]
    GeminiOnly,
}

/// Processing metadata echoed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingInfo {
    pub file_size: usize,
    pub content_type: String,
    /// Model calls made: 1 for a primary hit, 2 when the fallback ran.
    pub attempts: u32,
}

/// A completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub description: String,
    pub card_name: Option<String>,
    pub processing_info: ProcessingInfo,
    pub data_source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_data: Option<CardPayload>,
}

/// The pipeline orchestrator. Cheap to clone behind the server state.
pub struct Scanner {
    config: ScanConfig,
    vision: Arc<dyn VisionModel>,
    catalog: Arc<dyn CardCatalog>,
}

impl Scanner {
    pub fn new(
        config: ScanConfig,
        vision: Arc<dyn VisionModel>,
        catalog: Arc<dyn CardCatalog>,
    ) -> Self {
        Self {
            config,
            vision,
            catalog,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn vision(&self) -> &dyn VisionModel {
        self.vision.as_ref()
    }

    /// Run a full scan.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, ScanError> {
        self.validate(&request)?;
        let file_size = request.bytes.len();
        let content_type = request.content_type.clone();

        // Decode and resize on a blocking thread; a 10 MiB JPEG decode is
        // long enough to stall the runtime's worker threads.
        let target_px = self.config.resize_target_px;
        let threshold = self.config.recompress_threshold_bytes;
        let quality = self.config.jpeg_quality;
        let bytes = request.bytes;
        let encoded = tokio::task::spawn_blocking(move || {
            normalize::normalize(&bytes, target_px, threshold)?.encode_for_model(quality)
        })
        .await
        .map_err(|e| ScanError::Internal(format!("image task panicked: {e}")))??;

        let vision_result =
            vision::describe_card(self.vision.as_ref(), &encoded, &self.config).await?;

        tracing::info!(
            card_name = vision_result.card_name.as_deref().unwrap_or("<none>"),
            attempt = ?vision_result.attempt,
            "vision stage complete"
        );

        let mut response = ScanResponse {
            success: true,
            description: vision_result.description,
            card_name: vision_result.card_name.clone(),
            processing_info: ProcessingInfo {
                file_size,
                content_type,
                attempts: vision_result.attempt.call_count(),
            },
            data_source: DataSource::GeminiOnly,
            card_data: None,
        };

        // Enrichment is best-effort: no name, or a recoverable lookup
        // failure, leaves the response in gemini_only form.
        if let Some(name) = &vision_result.card_name {
            match crate::pipeline::lookup::lookup_card(self.catalog.as_ref(), name).await {
                Ok(payload) => {
                    response.card_name = Some(payload.name.clone());
                    response.card_data = Some(payload);
                    response.data_source = DataSource::Scryfall;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(card = %name, error = %e, "card lookup failed, degrading to vision-only response");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(response)
    }

    fn validate(&self, request: &ScanRequest) -> Result<(), ScanError> {
        if !request.content_type.starts_with("image/") {
            return Err(ScanError::InvalidUpload {
                reason: format!("expected an image upload, got '{}'", request.content_type),
            });
        }
        if request.bytes.is_empty() {
            return Err(ScanError::InvalidUpload {
                reason: "empty file".to_string(),
            });
        }
        if request.bytes.len() > self.config.max_upload_bytes {
            return Err(ScanError::InvalidUpload {
                reason: format!(
                    "file is {} bytes, limit is {}",
                    request.bytes.len(),
                    self.config.max_upload_bytes
                ),
            });
        }
        Ok(())
    }
}
