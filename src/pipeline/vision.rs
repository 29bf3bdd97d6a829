//! Vision stage: ask the model what card is in the photo.
//!
//! The model sits behind the [`VisionModel`] trait so the pipeline can be
//! tested against scripted replies; the production impl is
//! [`crate::gemini::GeminiClient`].
//!
//! ## Attempt policy
//!
//! * The **primary** attempt sends the structured prompt under a hard
//!   deadline. A deadline miss is terminal — the whole scan fails with
//!   [`ScanError::VisionTimeout`] and no second call is made, because a
//!   model that just blew a 90 s budget will not answer a retry any faster.
//! * If the primary attempt errors, or answers with empty text, exactly one
//!   **fallback** attempt runs with a minimal prompt under the same
//!   deadline.
//! * If the fallback also fails, the error surfaced is the *primary*
//!   attempt's, classified into a tagged variant — the first failure is the
//!   diagnostic one; the fallback failing too adds nothing.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::extract;
use crate::pipeline::normalize::EncodedImage;
use crate::prompts::{FALLBACK_PROMPT, PRIMARY_PROMPT};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Raw failure from a model provider, before classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModelCallError {
    pub message: String,
}

impl ModelCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One candidate answer in a model reply.
#[derive(Debug, Clone, Default)]
pub struct ReplyCandidate {
    pub parts: Vec<String>,
}

/// A reply from the vision model.
///
/// Providers return zero or more candidates, each holding text parts. The
/// single [`text`](ModelReply::text) accessor hides that shape from callers
/// so the pipeline never probes provider-specific fields.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub candidates: Vec<ReplyCandidate>,
}

impl ModelReply {
    /// Build a single-candidate reply. Mostly useful in tests.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![ReplyCandidate {
                parts: vec![text.into()],
            }],
        }
    }

    /// The first candidate's non-empty joined text, trimmed. `None` when the
    /// reply carries no usable text at all.
    pub fn text(&self) -> Option<String> {
        self.candidates
            .iter()
            .map(|c| c.parts.join("").trim().to_string())
            .find(|t| !t.is_empty())
    }
}

/// Which prompt produced the accepted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Fallback,
}

impl Attempt {
    /// Number of model calls made to reach this outcome.
    pub fn call_count(self) -> u32 {
        match self {
            Attempt::Primary => 1,
            Attempt::Fallback => 2,
        }
    }
}

/// Outcome of the vision stage.
#[derive(Debug, Clone)]
pub struct VisionResult {
    /// The model's full reply text.
    pub description: String,
    /// The card name isolated from the reply, when extraction succeeded.
    pub card_name: Option<String>,
    pub attempt: Attempt,
}

/// Seam between the pipeline and a vision-model provider.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `prompt` (and optionally an image) to the model and return its
    /// reply. Implementations report provider failures as [`ModelCallError`]
    /// with the provider's message intact; classification happens here.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&EncodedImage>,
    ) -> Result<ModelReply, ModelCallError>;
}

/// Run the attempt policy against `model` and extract a card name.
pub async fn describe_card(
    model: &dyn VisionModel,
    image: &EncodedImage,
    config: &ScanConfig,
) -> Result<VisionResult, ScanError> {
    let deadline = Duration::from_secs(config.vision_timeout_secs);

    let primary_failure = match timeout(deadline, model.generate(PRIMARY_PROMPT, Some(image))).await
    {
        Err(_) => {
            return Err(ScanError::VisionTimeout {
                secs: config.vision_timeout_secs,
            });
        }
        Ok(Ok(reply)) => match reply.text() {
            Some(description) => {
                let card_name = extract::extract_card_name(&description);
                return Ok(VisionResult {
                    description,
                    card_name,
                    attempt: Attempt::Primary,
                });
            }
            None => ModelCallError::new("empty model response"),
        },
        Ok(Err(e)) => e,
    };

    tracing::warn!(error = %primary_failure, "primary vision attempt failed, trying fallback prompt");

    match timeout(deadline, model.generate(FALLBACK_PROMPT, Some(image))).await {
        Ok(Ok(reply)) => {
            if let Some(description) = reply.text() {
                let card_name = extract::extract_card_name(&description);
                return Ok(VisionResult {
                    description,
                    card_name,
                    attempt: Attempt::Fallback,
                });
            }
            Err(classify_failure(&primary_failure.message))
        }
        // Fallback error or deadline miss: the primary failure is the one
        // worth reporting.
        _ => Err(classify_failure(&primary_failure.message)),
    }
}

/// Classify a raw provider message into a tagged error variant.
pub fn classify_failure(message: &str) -> ScanError {
    let lower = message.to_lowercase();
    if lower.contains("quota") || lower.contains("limit") || lower.contains("429") {
        ScanError::VisionQuotaExceeded
    } else if lower.contains("safety") || lower.contains("blocked") {
        ScanError::VisionContentBlocked
    } else {
        ScanError::Vision {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted model: pops one canned outcome per call and counts calls.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<ModelReply, ModelCallError>>>,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ModelReply, ModelCallError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn generate(
            &self,
            _prompt: &str,
            _image: Option<&EncodedImage>,
        ) -> Result<ModelReply, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ModelCallError::new("script exhausted"));
            }
            replies.remove(0)
        }
    }

    fn test_config() -> ScanConfig {
        ScanConfig::builder()
            .gemini_api_key("test-key")
            .vision_timeout_secs(5)
            .build()
            .unwrap()
    }

    fn test_image() -> EncodedImage {
        EncodedImage {
            data: "aGVsbG8=".to_string(),
            mime_type: "image/png",
        }
    }

    #[tokio::test]
    async fn primary_success_extracts_name() {
        let model = ScriptedModel::new(vec![Ok(ModelReply::from_text(
            "NOME: Lightning Bolt\nDESCRIÇÃO: mágica vermelha de 1 mana",
        ))]);
        let result = describe_card(&model, &test_image(), &test_config())
            .await
            .unwrap();
        assert_eq!(result.card_name.as_deref(), Some("Lightning Bolt"));
        assert_eq!(result.attempt, Attempt::Primary);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn primary_error_falls_back_once() {
        let model = ScriptedModel::new(vec![
            Err(ModelCallError::new("transient provider hiccup")),
            Ok(ModelReply::from_text("Counterspell")),
        ]);
        let result = describe_card(&model, &test_image(), &test_config())
            .await
            .unwrap();
        assert_eq!(result.card_name.as_deref(), Some("Counterspell"));
        assert_eq!(result.attempt, Attempt::Fallback);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_primary_reply_triggers_fallback() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::default()),
            Ok(ModelReply::from_text("Serra Angel")),
        ]);
        let result = describe_card(&model, &test_image(), &test_config())
            .await
            .unwrap();
        assert_eq!(result.attempt, Attempt::Fallback);
        assert_eq!(result.card_name.as_deref(), Some("Serra Angel"));
    }

    #[tokio::test]
    async fn fallback_failure_surfaces_primary_error() {
        let model = ScriptedModel::new(vec![
            Err(ModelCallError::new("invalid api key for project")),
            Err(ModelCallError::new("still broken")),
        ]);
        let err = describe_card(&model, &test_image(), &test_config())
            .await
            .unwrap_err();
        // Classified from the PRIMARY message, not the fallback's.
        match err {
            ScanError::Vision { message } => assert!(message.contains("invalid api key")),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_terminal_without_fallback() {
        let model = ScriptedModel::new(vec![Ok(ModelReply::from_text("too late"))])
            .with_delay(Duration::from_secs(600));
        let err = describe_card(&model, &test_image(), &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::VisionTimeout { secs: 5 }));
        assert_eq!(model.call_count(), 1, "no fallback after a timeout");
    }

    #[test]
    fn classify_quota() {
        assert!(matches!(
            classify_failure("429 resource exhausted: quota"),
            ScanError::VisionQuotaExceeded
        ));
    }

    #[test]
    fn classify_usage_limit_as_quota() {
        assert!(matches!(
            classify_failure("You have exceeded your current usage limit"),
            ScanError::VisionQuotaExceeded
        ));
    }

    #[test]
    fn classify_blocked() {
        assert!(matches!(
            classify_failure("prompt blocked by safety settings"),
            ScanError::VisionContentBlocked
        ));
    }

    #[test]
    fn classify_other_keeps_message() {
        match classify_failure("model exploded") {
            ScanError::Vision { message } => assert_eq!(message, "model exploded"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reply_text_skips_empty_candidates() {
        let reply = ModelReply {
            candidates: vec![
                ReplyCandidate { parts: vec![] },
                ReplyCandidate {
                    parts: vec!["  Black Lotus  ".to_string()],
                },
            ],
        };
        assert_eq!(reply.text().as_deref(), Some("Black Lotus"));
    }

    #[test]
    fn attempt_call_counts() {
        assert_eq!(Attempt::Primary.call_count(), 1);
        assert_eq!(Attempt::Fallback.call_count(), 2);
    }
}
