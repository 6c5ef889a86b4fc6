//! Always-available claim extraction: sentence splitting, factual
//! filtering, word-overlap scoring, entity extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use super::entities::extract_entities;
use crate::types::Entity;

static SENTENCE_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

const FACTUAL_INDICATORS: &[&str] = &[
    "announced", "reported", "according to", "million", "billion", "percent",
    "сообщил", "заявил", "сообщила", "объявил", "по данным",
];

pub struct Candidate {
    pub text: String,
    pub entities: Vec<Entity>,
}

fn is_candidate_sentence(sentence: &str) -> bool {
    let len = sentence.chars().count();
    if !(20..=500).contains(&len) {
        return false;
    }
    let lower = sentence.to_lowercase();
    let has_indicator = FACTUAL_INDICATORS.iter().any(|ind| lower.contains(ind))
        || sentence.contains('%');
    let has_digit = sentence.chars().any(|c| c.is_ascii_digit());
    has_indicator || has_digit
}

fn word_overlap_score(a: &str, b: &str) -> f64 {
    let tokens_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    let overlap = tokens_a.intersection(&tokens_b).count() as f64;
    if overlap == 0.0 {
        return 0.0;
    }
    let denom = (tokens_a.len() as f64).max(1.0).ln() + (tokens_b.len() as f64).max(1.0).ln() + 1.0;
    overlap / denom
}

/// Splits text into sentences, keeps factual candidates, scores each by
/// summed overlap with all other candidates, and returns the top 10
/// with their extracted entities.
pub fn extract_claims(text: &str) -> Vec<Candidate> {
    let sentences: Vec<&str> = SENTENCE_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidates: Vec<&str> = sentences
        .into_iter()
        .filter(|s| is_candidate_sentence(s))
        .collect();

    let mut scored: Vec<(f64, &str)> = candidates
        .iter()
        .map(|&s| {
            let score: f64 = candidates
                .iter()
                .filter(|&&other| other != s)
                .map(|&other| word_overlap_score(s, other))
                .sum();
            (score, s)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(10)
        .map(|(_, sentence)| Candidate {
            text: sentence.to_string(),
            entities: extract_entities(sentence),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_sentences_with_digits_or_indicators() {
        assert!(is_candidate_sentence("Apple Inc reported that iPhone sales rose 15 percent in Q3 2024"));
        assert!(!is_candidate_sentence("It was a nice day"));
    }

    #[test]
    fn drops_too_short_or_too_long_sentences() {
        assert!(!is_candidate_sentence("5%"));
        let long = "a".repeat(600);
        assert!(!is_candidate_sentence(&long));
    }

    #[test]
    fn extract_claims_returns_top_candidates_with_entities() {
        let text = "Apple Inc announced that iPhone sales rose 15% in Q3 2024. \
                    The weather was nice that day. \
                    Analysts at Apple Inc reported strong demand for the new iPhone models.";
        let claims = extract_claims(text);
        assert!(!claims.is_empty());
        assert!(claims.len() <= 10);
        assert!(claims[0].text.contains("Apple") || claims[0].text.contains("iPhone"));
    }
}
