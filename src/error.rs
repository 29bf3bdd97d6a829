//! Error types for the card-scan pipeline.
//!
//! Every stage returns a tagged [`ScanError`] variant instead of a bare
//! message, so the HTTP boundary can map each failure to a status code and
//! user-facing text without sniffing error strings. Two variants —
//! [`ScanError::CardNotFound`] and [`ScanError::Lookup`] — are *recovered*
//! failures: the orchestrator swallows them and degrades the response to
//! `data_source = "gemini_only"` rather than failing the scan. Everything
//! else propagates to the caller.
//!
//! [`classify_unexpected`] is the one place keyword matching survives: it
//! turns a genuinely unclassified internal message into the closest
//! user-facing family. It is applied to [`ScanError::Internal`] only and
//! never re-wraps an already-classified error.

use thiserror::Error;

/// All errors produced by the scan pipeline.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Client input errors ───────────────────────────────────────────────
    /// The upload failed basic validation (wrong type, empty, too large).
    #[error("invalid upload: {reason}")]
    InvalidUpload { reason: String },

    /// The upload bytes could not be decoded as an image.
    #[error("could not decode image: {detail}")]
    ImageDecode { detail: String },

    // ── Vision-stage errors (surfaced to the caller) ──────────────────────
    /// The primary vision call missed its deadline. Terminal — no fallback
    /// attempt is made after a timeout.
    #[error("vision model timed out after {secs}s")]
    VisionTimeout { secs: u64 },

    /// The vision provider reported a quota or rate limit.
    #[error("vision model quota exceeded")]
    VisionQuotaExceeded,

    /// The image was rejected by the provider's safety filters.
    #[error("image blocked by the vision model's safety filters")]
    VisionContentBlocked,

    /// Any other vision-stage failure, with the provider's message attached.
    #[error("vision model error: {message}")]
    Vision { message: String },

    // ── Lookup-stage errors (recovered by the orchestrator) ───────────────
    /// Neither exact nor fuzzy lookup found the card.
    #[error("card '{name}' not found in the card database")]
    CardNotFound { name: String },

    /// A transport-level failure talking to the card database.
    #[error("card database error: {message}")]
    Lookup { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error from any stage.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// True for the lookup-stage failures the orchestrator swallows.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::CardNotFound { .. } | ScanError::Lookup { .. }
        )
    }
}

/// Map an unclassified internal error message to a user-facing message.
///
/// This preserves the original service's last-resort UX layer: rather than
/// leaking a raw provider message, the boundary shows the closest known
/// failure family. Substring families, checked in order: authentication,
/// connectivity, timeout, memory/size, else generic.
pub fn classify_unexpected(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("api key")
        || lower.contains("authentication")
        || lower.contains("unauthorized")
    {
        "Vision model authentication failed. Check the API key configuration.".to_string()
    } else if lower.contains("connection") || lower.contains("network") || lower.contains("dns") {
        "Connection error. Check your internet connection and try again.".to_string()
    } else if lower.contains("timeout") {
        "The request timed out. Try a smaller image.".to_string()
    } else if lower.contains("memory") || lower.contains("size") {
        "Image too large to process. Use a smaller image.".to_string()
    } else {
        format!("Internal server error: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_budget() {
        let e = ScanError::VisionTimeout { secs: 90 };
        assert!(e.to_string().contains("90s"), "got: {e}");
    }

    #[test]
    fn card_not_found_display_includes_name() {
        let e = ScanError::CardNotFound {
            name: "Black Lotus".into(),
        };
        assert!(e.to_string().contains("Black Lotus"));
    }

    #[test]
    fn lookup_errors_are_recoverable() {
        assert!(ScanError::CardNotFound { name: "x".into() }.is_recoverable());
        assert!(ScanError::Lookup {
            message: "connection refused".into()
        }
        .is_recoverable());
        assert!(!ScanError::VisionTimeout { secs: 45 }.is_recoverable());
        assert!(!ScanError::InvalidUpload {
            reason: "empty".into()
        }
        .is_recoverable());
    }

    #[test]
    fn classify_auth_family() {
        let msg = classify_unexpected("invalid API key provided");
        assert!(msg.contains("authentication"), "got: {msg}");
    }

    #[test]
    fn classify_connectivity_family() {
        let msg = classify_unexpected("Network unreachable");
        assert!(msg.contains("Connection error"), "got: {msg}");
    }

    #[test]
    fn classify_timeout_family() {
        let msg = classify_unexpected("operation timeout elapsed");
        assert!(msg.contains("timed out"), "got: {msg}");
    }

    #[test]
    fn classify_size_family() {
        let msg = classify_unexpected("request body size exceeds maximum");
        assert!(msg.contains("smaller image"), "got: {msg}");
    }

    #[test]
    fn classify_generic_keeps_message() {
        let msg = classify_unexpected("something odd happened");
        assert!(msg.contains("something odd happened"));
    }
}
