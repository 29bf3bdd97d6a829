//! Card-name extraction from free-form vision-model text.
//!
//! ## Why a rule ladder?
//!
//! The model's output format is not guaranteed. Depending on the prompt,
//! the image, and the model's mood, the reply can be a labeled template
//! (`NOME: Lightning Bolt`), prose with the name in quotes, or just the
//! name on its own line. Extraction therefore tries several plausible
//! shapes in priority order and takes the first hit.
//!
//! A false extraction is worse than none: a bare article or generic noun
//! sent downstream triggers an expensive, likely-wrong database lookup.
//! Every candidate passes through [`sanitize`], which strips decoration,
//! rejects too-short tokens, and rejects a stoplist of function words in
//! both Portuguese (the prompt language) and English (the card language).
//!
//! ## Rule order
//!
//! 1. Labeled fields — `NOME:` / `Carta:` / `Name:` / `Card:` on any line,
//!    each pattern tried over the whole text before the next.
//! 2. Quoted phrases — double or curly quotes.
//! 3. First plausible line — alphanumeric-ish, 4–39 chars, not starting
//!    with a known non-name prefix, among the first five lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Labeled-field patterns, in priority order. Each captures the rest of the
/// line after the label; [`sanitize`] handles trailing decoration.
static LABELED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?mi)\bnome\s*[:：]\s*([^\n]+)",
        r"(?mi)\bcarta\s*[:：]\s*([^\n]+)",
        r"(?mi)\bname\s*[:：]\s*([^\n]+)",
        r"(?mi)\bcard\s*[:：]\s*([^\n]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("labeled pattern must compile"))
    .collect()
});

/// Quoted-phrase patterns. Straight single quotes are deliberately absent:
/// card names contain apostrophes (`Gaea's Cradle`) and a single-quote rule
/// mangles them.
static QUOTED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r#""([^"\n]{3,60})""#, r"“([^”\n]{3,60})”"]
        .iter()
        .map(|p| Regex::new(p).expect("quoted pattern must compile"))
        .collect()
});

/// Shape of a line that could plausibly be a bare card name.
static NAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-zÀ-ÿ0-9 '’\-,]+$").expect("name-line pattern must compile"));

/// Function words and generic nouns that are never card names.
const STOPLIST: &[&str] = &[
    "da", "de", "do", "das", "dos", "uma", "um", "esta", "este", "essa", "esse", "tipo", "custo",
    "carta", "criatura", "the", "card", "creature",
];

/// Line prefixes that mark descriptive prose rather than a name.
const NON_NAME_PREFIXES: &[&str] = &["esta", "essa", "a carta", "tipo", "custo", "this", "the card"];

/// Heuristically isolate the most likely card name in `description`.
///
/// Returns `None` when no rule produces a plausible name — callers must
/// treat that as "name unknown", not as an error.
pub fn extract_card_name(description: &str) -> Option<String> {
    // Rule 1: labeled fields, first match wins.
    for pattern in LABELED_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(description) {
            if let Some(name) = sanitize(&caps[1]) {
                return Some(name);
            }
        }
    }

    // Rule 2: quoted phrases.
    for pattern in QUOTED_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(description) {
            if let Some(name) = sanitize(&caps[1]) {
                return Some(name);
            }
        }
    }

    // Rule 3: first plausible line.
    for line in description.lines().filter(|l| !l.trim().is_empty()).take(5) {
        let line = line.trim();
        let char_len = line.chars().count();
        if !(4..40).contains(&char_len) {
            continue;
        }
        let lower = line.to_lowercase();
        if NON_NAME_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            continue;
        }
        if !NAME_LINE.is_match(line) {
            continue;
        }
        if let Some(name) = sanitize(line) {
            return Some(name);
        }
    }

    None
}

/// Trim decoration off a raw candidate and reject garbage tokens.
///
/// Cuts the candidate at the first `.`, ` (` or ` -` (the model follows
/// names with parenthesised sets or dashed commentary), strips markdown
/// emphasis and bracket characters, then rejects anything shorter than
/// three characters or equal to a stoplisted word.
fn sanitize(raw: &str) -> Option<String> {
    let mut s = raw.trim();

    for terminator in [". ", " (", " -"] {
        if let Some(idx) = s.find(terminator) {
            s = &s[..idx];
        }
    }
    // A plain trailing period also terminates ("Lightning Bolt.").
    s = s.trim_end_matches('.');

    let cleaned = s
        .trim_matches(|c: char| c.is_whitespace() || "*_#\"[]“”".contains(c))
        .trim_end_matches(',')
        .trim();

    if cleaned.chars().count() < 3 || cleaned.chars().count() > 50 {
        return None;
    }
    if STOPLIST.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }

    Some(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_nome_field() {
        assert_eq!(
            extract_card_name("NOME: Lightning Bolt"),
            Some("Lightning Bolt".to_string())
        );
    }

    #[test]
    fn labeled_field_mid_text() {
        let text = "Analisando a imagem...\nNOME: Lightning Bolt\nDESCRIÇÃO: mágica vermelha";
        assert_eq!(
            extract_card_name(text),
            Some("Lightning Bolt".to_string())
        );
    }

    #[test]
    fn labeled_card_field_english() {
        assert_eq!(
            extract_card_name("Card: Counterspell\nA blue instant."),
            Some("Counterspell".to_string())
        );
    }

    #[test]
    fn labeled_field_with_markdown_emphasis() {
        assert_eq!(
            extract_card_name("NOME: **Black Lotus**"),
            Some("Black Lotus".to_string())
        );
    }

    #[test]
    fn labeled_field_cut_at_parenthesis() {
        assert_eq!(
            extract_card_name("Nome: Shivan Dragon (Alpha edition)"),
            Some("Shivan Dragon".to_string())
        );
    }

    #[test]
    fn labeled_beats_quoted() {
        let text = "NOME: Giant Growth\nA carta \"mais famosa\" do conjunto.";
        assert_eq!(extract_card_name(text), Some("Giant Growth".to_string()));
    }

    #[test]
    fn quoted_phrase() {
        let text = "A carta na imagem é \"Serra Angel\", um anjo branco clássico.";
        assert_eq!(extract_card_name(text), Some("Serra Angel".to_string()));
    }

    #[test]
    fn curly_quoted_phrase() {
        let text = "Esta parece ser “Time Walk” em bom estado.";
        assert_eq!(extract_card_name(text), Some("Time Walk".to_string()));
    }

    #[test]
    fn first_line_heuristic() {
        let text = "Gaea's Cradle\nUma terra lendária do conjunto Urza's Saga.";
        assert_eq!(extract_card_name(text), Some("Gaea's Cradle".to_string()));
    }

    #[test]
    fn stoplisted_word_alone_yields_nothing() {
        assert_eq!(extract_card_name("uma"), None);
        assert_eq!(extract_card_name("carta"), None);
    }

    #[test]
    fn stoplisted_labeled_value_yields_nothing() {
        assert_eq!(extract_card_name("NOME: carta"), None);
    }

    #[test]
    fn descriptive_prose_yields_nothing() {
        let text = "Esta imagem mostra o verso de uma carta, sem nome visível.";
        assert_eq!(extract_card_name(text), None);
    }

    #[test]
    fn too_short_token_yields_nothing() {
        assert_eq!(extract_card_name("NOME: X"), None);
    }

    #[test]
    fn overlong_line_yields_nothing() {
        let long = "a".repeat(80);
        assert_eq!(extract_card_name(&format!("NOME: {long}")), None);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(extract_card_name(""), None);
        assert_eq!(extract_card_name("   \n\n  "), None);
    }

    #[test]
    fn accented_name_survives() {
        assert_eq!(
            extract_card_name("NOME: Ajani, Força da Matilha"),
            Some("Ajani, Força da Matilha".to_string())
        );
    }
}
