//! Prompts sent to the vision model.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the extractor's labeled-field patterns
//!    (`NOME:` / `DESCRIÇÃO:`) are shaped by the primary prompt; changing one
//!    without the other silently breaks extraction, so they live one import
//!    apart.
//!
//! 2. **Testability** — unit tests can inspect prompt text directly without
//!    calling a real model.
//!
//! The prompts are Portuguese because the mobile app's users are — the
//! extractor's stoplist and patterns match accordingly.

/// Structured prompt for the primary vision attempt.
///
/// Asks for a labeled name line first because the name is the only field the
/// downstream lookup needs; the description is a bonus for the app's UI.
pub const PRIMARY_PROMPT: &str = "\
Esta é uma carta de Magic: The Gathering. Identifique rapidamente:\n\n\
NOME: [nome da carta - MAIS IMPORTANTE]\n\
DESCRIÇÃO: [breve descrição da carta]\n\n\
Foque APENAS no nome da carta. Se não conseguir ler o nome completo, \
tente ler pelo menos parte dele. Seja rápido e direto.";

/// Minimal prompt for the single fallback attempt after a primary failure.
pub const FALLBACK_PROMPT: &str = "Nome desta carta Magic:";

/// Text-only prompt used by the connectivity probe endpoint.
pub const PROBE_PROMPT: &str = "Diga apenas 'OK' se você está funcionando.";
