//! HTTP surface for the scan service.
//!
//! Thin by intent: handlers unpack the multipart upload, hand it to
//! [`Scanner`], and serialise the result. All policy lives in the pipeline;
//! all status-code mapping lives in [`ApiError`], keyed off tagged
//! [`ScanError`] variants rather than message text.
//!
//! CORS is wide open because the client is a mobile app hitting the service
//! from whatever origin its webview reports.

use crate::error::{classify_unexpected, ScanError};
use crate::prompts::PROBE_PROMPT;
use crate::scan::{ScanRequest, Scanner};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    // Body limit above the validation limit so oversize uploads reach the
    // pipeline and get its tagged error instead of a bare 413.
    let body_limit = state.scanner.config().max_upload_bytes + 1024 * 1024;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/test/gemini", get(test_gemini))
        .route("/api/scan", post(scan))
        .route("/api/debug-image", post(debug_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Magic Scanner API", "status": "running" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

/// Connectivity probe: one text-only model call, no image.
async fn test_gemini(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.scanner.vision().generate(PROBE_PROMPT, None).await {
        Ok(reply) => Json(json!({
            "status": "success",
            "message": "Gemini is responding",
            "response": reply.text().unwrap_or_else(|| "reply received".to_string()),
        })),
        Err(e) => Json(json!({ "status": "error", "message": e.to_string() })),
    }
}

async fn scan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<crate::scan::ScanResponse>, ApiError> {
    let request = read_file_field(multipart).await?;
    let response = state.scanner.scan(request).await?;
    Ok(Json(response))
}

/// Upload diagnostics: validation flags and decode properties, no model
/// call. Useful when the app reports "scan fails for this one photo".
async fn debug_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = read_file_field(multipart).await?;
    let config = state.scanner.config();

    let content_type_ok = request.content_type.starts_with("image/");
    let size_ok = !request.bytes.is_empty() && request.bytes.len() <= config.max_upload_bytes;

    let mut info = json!({
        "file_info": {
            "content_type": request.content_type,
            "size_bytes": request.bytes.len(),
            "size_mb": (request.bytes.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
        },
        "validations": {
            "content_type": content_type_ok,
            "size": size_ok,
            "decodable": false,
        },
    });

    match image::load_from_memory(&request.bytes) {
        Ok(decoded) => {
            info["validations"]["decodable"] = json!(true);
            info["image_details"] = json!({
                "width": decoded.width(),
                "height": decoded.height(),
                "color_type": format!("{:?}", decoded.color()),
            });
        }
        Err(e) => {
            info["decode_error"] = json!(e.to_string());
        }
    }

    Ok(Json(json!({ "status": "success", "debug_info": info })))
}

/// Pull the `file` field out of a multipart body.
async fn read_file_field(mut multipart: Multipart) -> Result<ScanRequest, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError(ScanError::InvalidUpload {
            reason: format!("malformed multipart body: {e}"),
        })
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            ApiError(ScanError::InvalidUpload {
                reason: format!("could not read upload: {e}"),
            })
        })?;
        return Ok(ScanRequest {
            bytes: bytes.to_vec(),
            content_type,
        });
    }

    Err(ApiError(ScanError::InvalidUpload {
        reason: "missing 'file' field in multipart body".to_string(),
    }))
}

/// HTTP boundary for [`ScanError`]: status code plus a `{error, code}` body.
pub struct ApiError(pub ScanError);

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            ScanError::InvalidUpload { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_upload", self.0.to_string())
            }
            ScanError::ImageDecode { .. } => {
                (StatusCode::BAD_REQUEST, "image_decode", self.0.to_string())
            }
            ScanError::VisionContentBlocked => (
                StatusCode::BAD_REQUEST,
                "content_blocked",
                self.0.to_string(),
            ),
            ScanError::VisionTimeout { .. } => (
                StatusCode::REQUEST_TIMEOUT,
                "vision_timeout",
                self.0.to_string(),
            ),
            ScanError::VisionQuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.0.to_string(),
            ),
            ScanError::Vision { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "vision_error",
                self.0.to_string(),
            ),
            ScanError::CardNotFound { .. } => {
                (StatusCode::NOT_FOUND, "card_not_found", self.0.to_string())
            }
            ScanError::Lookup { .. } => {
                (StatusCode::BAD_GATEWAY, "lookup_error", self.0.to_string())
            }
            ScanError::InvalidConfig(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_config",
                self.0.to_string(),
            ),
            ScanError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                classify_unexpected(message),
            ),
        };

        tracing::error!(code, %message, "request failed");
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_upload_maps_to_400() {
        let response = ApiError(ScanError::InvalidUpload {
            reason: "empty file".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "invalid_upload");
    }

    #[tokio::test]
    async fn timeout_maps_to_408() {
        let response = ApiError(ScanError::VisionTimeout { secs: 90 }).into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn quota_maps_to_429() {
        let response = ApiError(ScanError::VisionQuotaExceeded).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn internal_error_message_is_classified() {
        let response =
            ApiError(ScanError::Internal("invalid api key provided".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("authentication"), "got: {message}");
        assert!(!message.contains("invalid api key"));
    }
}
