//! Entity-type regexes and literal lists used by the heuristic claim
//! extractor.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Entity, EntityType};

const LOCATIONS: &[&str] = &[
    "united states", "usa", "russia", "ukraine", "china", "france", "germany", "united kingdom",
    "uk", "japan", "india", "moscow", "kyiv", "kiev", "washington", "london", "paris", "berlin",
    "beijing", "tokyo", "москва", "киев", "київ", "вашингтон",
];

static PERSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[A-ZА-ЯЁ][\p{L}'-]+(?:\s+[A-ZА-ЯЁ][\p{L}'-]+){1,2})\b").unwrap()
});

static ORG_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[\p{L}][\p{L}\s&]*?\s+(?:Inc\.?|Corp\.?|Corporation|Company|Co\.?|Ltd\.?|LLC|Group|ООО|ОАО|АО)\b").unwrap()
});

static CYRILLIC_ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[А-ЯЁ]{2,6}\b").unwrap());

static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$\s?\d[\d,\.]*\s?(?:million|billion|trillion)?)|(\d[\d,\.]*\s?(?:million|billion|trillion)?\s?(?:dollars|рублей|euros|евро))").unwrap()
});

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?%").unwrap());

/// Deduplicates by `(type, text)`, preserving first-seen order.
pub fn extract_entities(sentence: &str) -> Vec<Entity> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    let mut push = |text: String, kind: EntityType| {
        let key = (kind, text.clone());
        if seen.insert(key) {
            out.push(Entity { text, kind });
        }
    };

    for m in PERSON_RE.find_iter(sentence) {
        push(m.as_str().to_string(), EntityType::Person);
    }
    for m in ORG_SUFFIX_RE.find_iter(sentence) {
        push(m.as_str().trim().to_string(), EntityType::Org);
    }
    for m in CYRILLIC_ACRONYM_RE.find_iter(sentence) {
        push(m.as_str().to_string(), EntityType::Org);
    }
    let lower = sentence.to_lowercase();
    for loc in LOCATIONS {
        if lower.contains(loc) {
            push(loc.to_string(), EntityType::Loc);
        }
    }
    for m in MONEY_RE.find_iter(sentence) {
        push(m.as_str().trim().to_string(), EntityType::Money);
    }
    for m in PERCENT_RE.find_iter(sentence) {
        push(m.as_str().to_string(), EntityType::Percent);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_person_and_percent() {
        let entities = extract_entities("Vladimir Putin announced sales rose 15%");
        assert!(entities.iter().any(|e| e.kind == EntityType::Person && e.text == "Vladimir Putin"));
        assert!(entities.iter().any(|e| e.kind == EntityType::Percent));
    }

    #[test]
    fn extracts_location_case_insensitively() {
        let entities = extract_entities("Officials in Moscow confirmed the report");
        assert!(entities.iter().any(|e| e.kind == EntityType::Loc && e.text == "moscow"));
    }

    #[test]
    fn extracts_org_suffix() {
        let entities = extract_entities("Apple Inc reported strong earnings");
        assert!(entities.iter().any(|e| e.kind == EntityType::Org));
    }

    #[test]
    fn dedups_repeated_entities() {
        let entities = extract_entities("Moscow officials said Moscow would respond");
        let loc_count = entities.iter().filter(|e| e.kind == EntityType::Loc).count();
        assert_eq!(loc_count, 1);
    }
}
