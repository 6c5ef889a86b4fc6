//! Turns an item summary into 1-4 search queries, each stamped with a
//! detected language and a strategy label.

pub mod expand;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractor::lang::detect_language;
use crate::types::{GeneratedQuery, ResolvedLink};

const MAX_QUERY_CHARS: usize = 150;
const MIN_QUERY_CHARS: usize = 10;
const SHORT_SUMMARY_CHARS: usize = 100;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ENTITY_BIGRAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[A-ZА-ЯЁ][\p{L}'-]+(?:\s+[A-ZА-ЯЁ][\p{L}'-]+){1,2})\b").unwrap()
});
static ORG_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[\p{L}][\p{L}\s&]*?\s+(?:Inc\.?|Corp\.?|Corporation|Company|Co\.?|Ltd\.?|LLC|Group)\b").unwrap()
});
static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,6}\b").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]{3,60})""#).unwrap());

const COMMON_ACRONYM_DENYLIST: &[&str] = &["THE", "AND", "FOR", "BUT", "NOT"];

const LOCATIONS: &[&str] = &[
    "United States", "Russia", "Ukraine", "China", "France", "Germany", "United Kingdom",
    "Japan", "India", "Moscow", "Kyiv", "Washington", "London", "Paris", "Berlin", "Beijing",
];

const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "from", "this", "have", "are", "was", "were",
    "has", "had", "not", "but", "they", "their", "been", "will", "would", "about",
];

/// Strips emoji-range codepoints, `@mentions`, URLs, converts
/// `#hashtag` to `hashtag`, collapses whitespace.
pub fn clean_text(input: &str) -> String {
    let no_mentions = MENTION_RE.replace_all(input, "");
    let no_urls = URL_RE.replace_all(&no_mentions, "");
    let no_hashtags = HASHTAG_RE.replace_all(&no_urls, "$1");
    let no_emoji: String = no_hashtags.chars().filter(|c| !is_emoji(*c)).collect();
    WHITESPACE_RE.replace_all(&no_emoji, " ").trim().to_string()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF | 0x2190..=0x21FF
    )
}

#[derive(Debug, Default)]
struct Signals {
    entities: Vec<String>,
    locations: Vec<String>,
    keywords: Vec<String>,
}

fn extract_signals(text: &str) -> Signals {
    let mut entities = Vec::new();
    let mut seen = HashSet::new();
    for m in ENTITY_BIGRAM_RE.find_iter(text) {
        if seen.insert(m.as_str().to_string()) {
            entities.push(m.as_str().to_string());
        }
    }
    for m in ORG_SUFFIX_RE.find_iter(text) {
        if seen.insert(m.as_str().trim().to_string()) {
            entities.push(m.as_str().trim().to_string());
        }
    }
    for m in ACRONYM_RE.find_iter(text) {
        let s = m.as_str();
        if !COMMON_ACRONYM_DENYLIST.contains(&s) && seen.insert(s.to_string()) {
            entities.push(s.to_string());
        }
    }
    for cap in QUOTED_RE.captures_iter(text) {
        let s = cap[1].to_string();
        if seen.insert(s.clone()) {
            entities.push(s);
        }
    }

    let mut locations = Vec::new();
    for loc in LOCATIONS {
        if text.contains(loc) && !locations.contains(&loc.to_string()) {
            locations.push(loc.to_string());
        }
    }

    let mut frequency: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        let lower = token.to_lowercase();
        if lower.chars().count() >= 3 && !ENGLISH_STOP_WORDS.contains(&lower.as_str()) {
            *frequency.entry(lower).or_insert(0) += 1;
        }
    }
    let mut freq_vec: Vec<(String, usize)> = frequency.into_iter().collect();
    freq_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let keywords = freq_vec.into_iter().take(5).map(|(k, _)| k).collect();

    Signals { entities, locations, keywords }
}

fn trim_to_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(idx) if idx > 0 => truncated[..idx].to_string(),
        _ => truncated,
    }
}

pub struct QueryGenerator;

impl QueryGenerator {
    pub fn generate(
        summary: &str,
        topic: &str,
        channel_title: &str,
        resolved_links: &[ResolvedLink],
    ) -> Vec<GeneratedQuery> {
        let cleaned = clean_text(summary);
        let language = detect_language(&cleaned).unwrap_or_else(|| "unknown".to_string());

        let mut signals = extract_signals(&cleaned);
        if cleaned.chars().count() < SHORT_SUMMARY_CHARS
            || (signals.entities.is_empty() && signals.locations.is_empty())
        {
            for link in resolved_links {
                let combined = format!("{} {}", link.title, link.content);
                let extra = extract_signals(&combined);
                for e in extra.entities {
                    if !signals.entities.contains(&e) {
                        signals.entities.push(e);
                    }
                }
                for l in extra.locations {
                    if !signals.locations.contains(&l) {
                        signals.locations.push(l);
                    }
                }
                for k in extra.keywords {
                    if !signals.keywords.contains(&k) {
                        signals.keywords.push(k);
                    }
                }
            }
        }

        let mut candidates: Vec<(String, &'static str)> = Vec::new();

        if let Some(first_entity) = signals.entities.first() {
            let extra_keywords: Vec<&String> = signals
                .keywords
                .iter()
                .filter(|k| !first_entity.to_lowercase().contains(k.as_str()))
                .take(2)
                .collect();
            let mut q = first_entity.clone();
            for k in &extra_keywords {
                q.push(' ');
                q.push_str(k);
            }
            candidates.push((q, "entity"));
        }

        if let (Some(first_entity), Some(first_location)) = (signals.entities.first(), signals.locations.first()) {
            let independent_keyword = signals
                .keywords
                .iter()
                .find(|k| !first_entity.to_lowercase().contains(k.as_str()) && !first_location.to_lowercase().contains(k.as_str()));
            let mut q = format!("{first_entity} {first_location}");
            if let Some(k) = independent_keyword {
                q.push(' ');
                q.push_str(k);
            }
            candidates.push((q, "location"));
        }

        if !topic.is_empty() {
            let mut q = topic.to_string();
            if let Some(first_entity) = signals.entities.first() {
                q.push(' ');
                q.push_str(first_entity);
            }
            let independent_keyword = signals
                .keywords
                .iter()
                .find(|k| !q.to_lowercase().contains(k.as_str()));
            if let Some(k) = independent_keyword {
                q.push(' ');
                q.push_str(k);
            }
            candidates.push((q, "topic"));
        }

        if !signals.keywords.is_empty() {
            candidates.push((signals.keywords.join(" "), "keyword"));
        }

        {
            let mut fallback = String::new();
            if !channel_title.is_empty() {
                fallback.push_str(channel_title);
                fallback.push(' ');
            }
            fallback.push_str(&cleaned);
            candidates.push((fallback, "fallback"));
        }

        let mut seen_lower = HashSet::new();
        let mut out = Vec::new();
        for (query, strategy) in candidates {
            let trimmed = trim_to_word_boundary(query.trim(), MAX_QUERY_CHARS);
            if trimmed.chars().count() < MIN_QUERY_CHARS {
                continue;
            }
            let key = trimmed.to_lowercase();
            if !seen_lower.insert(key) {
                continue;
            }
            out.push(GeneratedQuery {
                query: trimmed,
                strategy: strategy.to_string(),
                language: language.clone(),
            });
            if out.len() == 4 {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_mentions_urls_and_hashtags() {
        let cleaned = clean_text("Breaking @user check https://example.com #BigNews now");
        assert!(!cleaned.contains('@'));
        assert!(!cleaned.contains("http"));
        assert!(cleaned.contains("BigNews"));
    }

    #[test]
    fn generates_at_most_four_unique_queries() {
        let queries = QueryGenerator::generate(
            "Apple Inc announced new iPhone sales increased by 15 percent in Q3 2024 in the United States",
            "Technology",
            "TechNews",
            &[],
        );
        assert!(queries.len() <= 4);
        let mut lower: Vec<String> = queries.iter().map(|q| q.query.to_lowercase()).collect();
        lower.sort();
        lower.dedup();
        assert_eq!(lower.len(), queries.len());
    }

    #[test]
    fn short_summary_pulls_signals_from_resolved_links() {
        let link = ResolvedLink {
            url: "https://example.com/a".into(),
            title: "Apple Inc Quarterly Report".into(),
            content: "Apple Inc reported strong sales growth across all regions".into(),
            word_count: 10,
            language: Some("en".into()),
        };
        let queries = QueryGenerator::generate("Short post", "Business", "", &[link]);
        assert!(queries.iter().any(|q| q.query.contains("Apple")));
    }

    #[test]
    fn drops_queries_under_minimum_length() {
        let queries = QueryGenerator::generate("hi", "", "", &[]);
        assert!(queries.iter().all(|q| q.query.chars().count() >= MIN_QUERY_CHARS));
    }
}
