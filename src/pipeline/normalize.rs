//! Image normalisation ahead of the vision call.
//!
//! Phone photos arrive as multi-megabyte JPEGs at full sensor resolution.
//! The model neither needs nor benefits from that: a card name is legible
//! at a few hundred pixels, and upload time dominates end-to-end latency.
//! Normalisation therefore:
//!
//! 1. decodes whatever format the client sent and converts to RGB,
//! 2. downsizes so the longest edge equals the configured target
//!    (Lanczos3, aspect ratio preserved, never upscaling),
//! 3. re-encodes for transport — lossy JPEG when the *original* upload was
//!    over the recompression threshold, lossless PNG otherwise.
//!
//! Everything here is CPU-bound and synchronous; the orchestrator runs it
//! on a blocking thread so decode work never stalls the async runtime.

use crate::error::ScanError;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// A decoded, resized image ready for transport encoding.
#[derive(Debug)]
pub struct NormalizedImage {
    pub pixels: RgbImage,
    /// Dimensions of the upload before resizing.
    pub original_width: u32,
    pub original_height: u32,
    /// Whether [`encode_for_model`](NormalizedImage::encode_for_model) will
    /// use lossy JPEG (set when the upload exceeded the recompression
    /// threshold).
    pub reencode_lossy: bool,
}

/// A transport-encoded image for the vision model request body.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64-encoded image bytes.
    pub data: String,
    /// `image/jpeg` or `image/png`.
    pub mime_type: &'static str,
}

/// Decode and downsize an upload.
///
/// `target_px` bounds the longest edge; `recompress_threshold_bytes` decides
/// whether the later encode is lossy. Fails with [`ScanError::ImageDecode`]
/// when the bytes are not a decodable image.
pub fn normalize(
    bytes: &[u8],
    target_px: u32,
    recompress_threshold_bytes: usize,
) -> Result<NormalizedImage, ScanError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ScanError::ImageDecode {
        detail: e.to_string(),
    })?;

    let (original_width, original_height) = (decoded.width(), decoded.height());
    let rgb = decoded.to_rgb8();

    let longest = original_width.max(original_height);
    let pixels = if longest > target_px {
        // Scale the longest edge to exactly target_px. Computing both edges
        // from the ratio (rather than letting a thumbnail helper round)
        // keeps the bound exact.
        let ratio = target_px as f64 / longest as f64;
        let new_w = ((original_width as f64 * ratio).round() as u32).max(1);
        let new_h = ((original_height as f64 * ratio).round() as u32).max(1);
        image::imageops::resize(&rgb, new_w, new_h, FilterType::Lanczos3)
    } else {
        rgb
    };

    Ok(NormalizedImage {
        pixels,
        original_width,
        original_height,
        reencode_lossy: bytes.len() > recompress_threshold_bytes,
    })
}

impl NormalizedImage {
    /// Encode for the model request: JPEG at `jpeg_quality` when the upload
    /// was over the recompression threshold, PNG otherwise.
    pub fn encode_for_model(&self, jpeg_quality: u8) -> Result<EncodedImage, ScanError> {
        let mut buf = Vec::new();
        let mime_type = if self.reencode_lossy {
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
            self.pixels
                .write_with_encoder(encoder)
                .map_err(|e| ScanError::Internal(format!("jpeg encode failed: {e}")))?;
            "image/jpeg"
        } else {
            DynamicImage::ImageRgb8(self.pixels.clone())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| ScanError::Internal(format!("png encode failed: {e}")))?;
            "image/png"
        };

        Ok(EncodedImage {
            data: base64::engine::general_purpose::STANDARD.encode(&buf),
            mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn landscape_resized_to_target_longest_edge() {
        let bytes = png_bytes(1600, 1200);
        let n = normalize(&bytes, 768, 2 * 1024 * 1024).unwrap();
        assert_eq!(n.pixels.width(), 768);
        assert_eq!(n.pixels.height(), 576);
        assert_eq!(n.original_width, 1600);
        assert_eq!(n.original_height, 1200);
    }

    #[test]
    fn portrait_resized_preserving_aspect() {
        let bytes = png_bytes(750, 1050);
        let n = normalize(&bytes, 768, 2 * 1024 * 1024).unwrap();
        assert_eq!(n.pixels.height(), 768);
        assert_eq!(n.pixels.width(), 549); // 750 * 768/1050, rounded
    }

    #[test]
    fn small_image_never_upscaled() {
        let bytes = png_bytes(320, 240);
        let n = normalize(&bytes, 768, 2 * 1024 * 1024).unwrap();
        assert_eq!(n.pixels.width(), 320);
        assert_eq!(n.pixels.height(), 240);
    }

    #[test]
    fn garbage_bytes_fail_decode() {
        let err = normalize(b"definitely not an image", 768, 1024).unwrap_err();
        assert!(matches!(err, ScanError::ImageDecode { .. }));
    }

    #[test]
    fn small_upload_encodes_lossless() {
        let bytes = png_bytes(100, 100);
        let n = normalize(&bytes, 768, 2 * 1024 * 1024).unwrap();
        assert!(!n.reencode_lossy);
        let encoded = n.encode_for_model(85).unwrap();
        assert_eq!(encoded.mime_type, "image/png");
        assert!(!encoded.data.is_empty());
    }

    #[test]
    fn oversize_upload_encodes_lossy() {
        let bytes = png_bytes(64, 64);
        // Threshold below the upload size forces the lossy path.
        let n = normalize(&bytes, 768, 10).unwrap();
        assert!(n.reencode_lossy);
        let encoded = n.encode_for_model(85).unwrap();
        assert_eq!(encoded.mime_type, "image/jpeg");
    }

    #[test]
    fn encoded_data_is_valid_base64() {
        let bytes = png_bytes(48, 48);
        let encoded = normalize(&bytes, 768, 2 * 1024 * 1024)
            .unwrap()
            .encode_for_model(85)
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&encoded.data)
            .unwrap();
        assert!(image::load_from_memory(&decoded).is_ok());
    }
}
