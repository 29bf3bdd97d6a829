//! Configuration for the scan service.
//!
//! All behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`] or read from the environment with
//! [`ScanConfig::from_env`]. Keeping every knob in one struct makes it
//! trivial to share the config across handlers, log it (the `Debug` impl
//! redacts the credential), and diff two deployments to understand why
//! their behaviour differs.
//!
//! # Design choice: builder over constructor
//! The original service carried two parallel variants with divergent numeric
//! budgets (45 s vs 90 s vision timeout, 512 px vs 768 px resize target).
//! Those are configuration choices, not semantics, so they live here as
//! fields with the fuller variant's values as defaults.

use crate::error::ScanError;
use std::env;
use std::fmt;

/// Configuration for the scan pipeline and HTTP server.
///
/// Built via [`ScanConfig::builder()`] or [`ScanConfig::from_env()`].
///
/// # Example
/// ```rust
/// use mtg_card_scanner::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .gemini_api_key("test-key")
///     .vision_timeout_secs(45)
///     .resize_target_px(512)
///     .build()
///     .unwrap();
/// assert_eq!(config.vision_timeout_secs, 45);
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// API credential for the vision model. Never logged.
    pub gemini_api_key: String,

    /// Vision model identifier. Default: "gemini-2.5-flash".
    pub gemini_model: String,

    /// Base URL of the vision model API. Overridable for tests.
    pub gemini_base_url: String,

    /// Base URL of the card database API. Overridable for tests.
    pub scryfall_base_url: String,

    /// Deadline for the primary vision call in seconds. Default: 90.
    ///
    /// The call is abandoned on expiry — the request fails fast with a
    /// timeout rather than waiting for the overrun call to ever complete.
    pub vision_timeout_secs: u64,

    /// Longest-edge bound for the normalised image in pixels. Default: 768.
    ///
    /// Smaller images upload and infer faster; card names stay legible well
    /// below this bound. Images are never upscaled.
    pub resize_target_px: u32,

    /// Upload size above which the image is re-encoded lossily before being
    /// sent to the model. Default: 2 MiB.
    pub recompress_threshold_bytes: usize,

    /// JPEG quality used when re-encoding lossily. Default: 85.
    pub jpeg_quality: u8,

    /// Maximum accepted upload size in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Sampling temperature for the vision model. Default: 0.1.
    ///
    /// Near-deterministic output is what you want when the task is "read the
    /// name printed on the card", not creative description.
    pub temperature: f32,

    /// Nucleus sampling bound. Default: 0.8.
    pub top_p: f32,

    /// Top-k sampling bound. Default: 40.
    pub top_k: u32,

    /// Output-length cap for the model reply. Default: 200 tokens.
    ///
    /// A short cap keeps responses fast; the reply only needs a name line
    /// and a brief description.
    pub max_output_tokens: u32,

    /// Network host to bind. Default: "0.0.0.0".
    pub host: String,

    /// Network port to bind. Default: 8000.
    pub port: u16,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            scryfall_base_url: "https://api.scryfall.com".to_string(),
            vision_timeout_secs: 90,
            resize_target_px: 768,
            recompress_threshold_bytes: 2 * 1024 * 1024,
            jpeg_quality: 85,
            max_upload_bytes: 10 * 1024 * 1024,
            temperature: 0.1,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 200,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("scryfall_base_url", &self.scryfall_base_url)
            .field("vision_timeout_secs", &self.vision_timeout_secs)
            .field("resize_target_px", &self.resize_target_px)
            .field("recompress_threshold_bytes", &self.recompress_threshold_bytes)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from the process environment.
    ///
    /// `GEMINI_API_KEY` is required; everything else is optional:
    /// `HOST`, `PORT`, `SCAN_VISION_TIMEOUT_SECS`, `SCAN_RESIZE_TARGET_PX`,
    /// `SCAN_MAX_UPLOAD_BYTES`, `GEMINI_MODEL`.
    pub fn from_env() -> Result<ScanConfig, ScanError> {
        let mut builder = Self::builder();

        match env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                builder = builder.gemini_api_key(key);
            }
            _ => {
                return Err(ScanError::InvalidConfig(
                    "GEMINI_API_KEY is not set — configure it in the environment or a .env file"
                        .to_string(),
                ));
            }
        }

        if let Ok(host) = env::var("HOST") {
            if !host.trim().is_empty() {
                builder = builder.host(host);
            }
        }
        if let Some(port) = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
            builder = builder.port(port);
        }
        if let Some(secs) = env::var("SCAN_VISION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            builder = builder.vision_timeout_secs(secs);
        }
        if let Some(px) = env::var("SCAN_RESIZE_TARGET_PX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            builder = builder.resize_target_px(px);
        }
        if let Some(bytes) = env::var("SCAN_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            builder = builder.max_upload_bytes(bytes);
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                builder = builder.gemini_model(model);
            }
        }

        builder.build()
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = key.into();
        self
    }

    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.config.gemini_model = model.into();
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn scryfall_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.scryfall_base_url = url.into();
        self
    }

    pub fn vision_timeout_secs(mut self, secs: u64) -> Self {
        self.config.vision_timeout_secs = secs.max(1);
        self
    }

    pub fn resize_target_px(mut self, px: u32) -> Self {
        self.config.resize_target_px = px.clamp(64, 4096);
        self
    }

    pub fn recompress_threshold_bytes(mut self, bytes: usize) -> Self {
        self.config.recompress_threshold_bytes = bytes;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n.max(1);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ScanError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        if c.recompress_threshold_bytes > c.max_upload_bytes {
            return Err(ScanError::InvalidConfig(format!(
                "recompress threshold ({}) exceeds max upload size ({})",
                c.recompress_threshold_bytes, c.max_upload_bytes
            )));
        }
        Ok(self.config)
    }
}
