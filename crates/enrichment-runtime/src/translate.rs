//! Machine translation collaborator: `Translate(ctx, text, targetLang) -> string`.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TranslateError {
    #[error("translation provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError>;
}

/// Known preamble markers an LLM-backed translator tends to prepend;
/// stripped from every response before it is used as a query.
const PREAMBLE_MARKERS: &[&str] = &[
    "Translation:",
    "Translated:",
    "Query:",
    "Перевод:",
    "Запрос:",
];

/// Strips known preamble markers, enclosing quotes, and embedded
/// newlines from a raw translator response.
pub fn clean_translation(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    loop {
        let mut stripped = false;
        for marker in PREAMBLE_MARKERS {
            if let Some(rest) = text.strip_prefix(marker) {
                text = rest.trim_start().to_string();
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    let text = text.trim();
    let text = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);
    let text = text
        .strip_prefix('\u{201c}')
        .and_then(|s| s.strip_suffix('\u{201d}'))
        .unwrap_or(text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity translator for tests: appends a marker so callers can see a
/// translation happened without depending on a real service.
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        Ok(format!("[{target_lang}] {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_preamble() {
        assert_eq!(clean_translation("Translation: hello world"), "hello world");
        assert_eq!(clean_translation("Перевод: привет"), "привет");
    }

    #[test]
    fn strips_quotes_and_collapses_whitespace() {
        assert_eq!(clean_translation("\"hello   world\"\n"), "hello world");
    }

    #[test]
    fn combined_preamble_and_quotes() {
        assert_eq!(clean_translation("Query: \"top news\""), "top news");
    }
}
