//! Script-ratio language detection, shared by the content extractor and
//! the query generator.

const UKRAINIAN_MARKERS: &[char] = &['і', 'ї', 'є', 'ґ', 'І', 'Ї', 'Є', 'Ґ'];

const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "from", "this", "have", "are", "was", "were",
    "has", "had", "not", "but", "they", "their", "been", "will", "would", "about",
];

/// Detects language from character script ratios. Mirrors the heuristic
/// used for query-signal extraction so both stay consistent.
pub fn detect_language(text: &str) -> Option<String> {
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    let mut greek = 0usize;
    let mut total_letters = 0usize;
    let mut has_ukrainian_marker = false;

    for ch in text.chars() {
        if !ch.is_alphabetic() {
            continue;
        }
        total_letters += 1;
        if UKRAINIAN_MARKERS.contains(&ch) {
            has_ukrainian_marker = true;
        }
        match ch {
            'a'..='z' | 'A'..='Z' => latin += 1,
            '\u{0400}'..='\u{04FF}' => cyrillic += 1,
            '\u{0370}'..='\u{03FF}' => greek += 1,
            _ => {}
        }
    }

    if total_letters == 0 {
        return None;
    }

    let cyrillic_ratio = cyrillic as f64 / total_letters as f64;
    let greek_ratio = greek as f64 / total_letters as f64;
    let latin_ratio = latin as f64 / total_letters as f64;

    if cyrillic_ratio >= 0.3 {
        return Some(if has_ukrainian_marker { "uk" } else { "ru" }.to_string());
    }
    if greek_ratio >= 0.2 {
        return Some("el".to_string());
    }
    if latin_ratio >= 0.5 {
        let words: Vec<&str> = text.split_whitespace().collect();
        if !words.is_empty() {
            let stop_hits = words
                .iter()
                .filter(|w| ENGLISH_STOP_WORDS.contains(&w.to_lowercase().as_str()))
                .count();
            if stop_hits as f64 / words.len() as f64 >= 0.08 {
                return Some("en".to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_russian() {
        let text = "Президент сообщил о новых мерах поддержки граждан страны";
        assert_eq!(detect_language(text), Some("ru".to_string()));
    }

    #[test]
    fn detects_ukrainian_by_marker() {
        let text = "Президент повідомив про нові заходи підтримки громадян країни";
        assert_eq!(detect_language(text), Some("uk".to_string()));
    }

    #[test]
    fn detects_english() {
        let text = "The president announced that the new measures would support citizens and the economy";
        assert_eq!(detect_language(text), Some("en".to_string()));
    }

    #[test]
    fn unknown_for_short_ambiguous_text() {
        assert_eq!(detect_language("123 456"), None);
    }
}
