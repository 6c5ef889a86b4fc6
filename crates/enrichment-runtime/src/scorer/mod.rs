//! Semantic agreement scoring between an item summary and evidence
//! claims: tokenised Jaccard overlap plus weighted entity overlap, with
//! contradiction detection and tier aggregation.

pub mod translit;

use std::collections::HashSet;

use crate::types::{Entity, EntityType, MatchedClaim, Tier};

const MIN_MATCH_SCORE: f64 = 0.3;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "from", "this", "have", "are", "was", "were",
    "has", "had", "not", "but", "they", "their", "been", "will", "would", "about", "its",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "never", "denied", "refuted", "нет", "никогда", "отрицал", "опроверг",
];

const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("increased", "decreased"),
    ("rose", "fell"),
    ("rise", "fall"),
    ("up", "down"),
    ("gained", "lost"),
    ("вырос", "упал"),
    ("увеличился", "снизился"),
];

const ALIASES: &[(&str, &str)] = &[
    ("usa", "unitedstates"),
    ("us", "unitedstates"),
    ("kyiv", "kiev"),
    ("putin", "vladimirputin"),
];

const CORPORATE_SUFFIXES: &[&str] = &["inc", "corp", "corporation", "company", "co", "ltd", "llc", "group"];

fn is_cyrillic_dominant(token: &str) -> bool {
    let cyr = token.chars().filter(|c| matches!(*c as u32, 0x0400..=0x04FF)).count();
    cyr * 2 >= token.chars().count()
}

/// Lowercase, split on non-letter/non-digit, drop short/stop tokens,
/// lightly stem Cyrillic-dominant tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| !ENGLISH_STOP_WORDS.contains(t))
        .map(|t| {
            if is_cyrillic_dominant(t) {
                translit::stem_russian(t)
            } else {
                t.to_string()
            }
        })
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Strips corporate suffixes and transliterates for comparison purposes.
fn normalize_entity_text(text: &str) -> String {
    let translit = translit::transliterate(text);
    let mut compact: String = translit.chars().filter(|c| !c.is_whitespace()).collect();
    for suffix in CORPORATE_SUFFIXES {
        if let Some(stripped) = compact.strip_suffix(suffix) {
            compact = stripped.to_string();
        }
    }
    compact
}

fn alias_equivalent(a: &str, b: &str) -> bool {
    ALIASES
        .iter()
        .any(|(l, r)| (a == *l && b == *r) || (a == *r && b == *l))
}

fn entities_match(a: &Entity, b: &Entity) -> bool {
    if a.kind != b.kind {
        return false;
    }
    let na = normalize_entity_text(&a.text);
    let nb = normalize_entity_text(&b.text);
    if na == nb || alias_equivalent(&na, &nb) {
        return true;
    }
    let mut na_chars = na.chars();
    let mut nb_chars = nb.chars();
    let na_prefix: String = (&mut na_chars).take(5).collect();
    let nb_prefix: String = (&mut nb_chars).take(5).collect();
    na_prefix.chars().count() == 5 && nb_prefix.chars().count() == 5 && na_prefix == nb_prefix
}

fn entity_weight(kind: EntityType) -> f64 {
    match kind {
        EntityType::Person | EntityType::Org | EntityType::Loc => 1.5,
        EntityType::Money | EntityType::Percent => 1.0,
    }
}

/// Fraction of item-side entities (weighted) that find a matching
/// evidence-side entity.
pub fn entity_overlap(item_entities: &[Entity], evidence_entities: &[Entity]) -> f64 {
    if item_entities.is_empty() {
        return 0.0;
    }
    let mut matched_weight = 0.0;
    let mut total_weight = 0.0;
    for item_entity in item_entities {
        let weight = entity_weight(item_entity.kind);
        total_weight += weight;
        if evidence_entities.iter().any(|e| entities_match(item_entity, e)) {
            matched_weight += weight;
        }
    }
    if total_weight == 0.0 {
        0.0
    } else {
        matched_weight / total_weight
    }
}

pub struct ScoredClaim {
    pub score: f64,
    pub is_contradiction: bool,
}

/// `agreementScore = clamp(0.6·jaccard + 0.4·entityOverlap, [0,1])`.
pub fn score_claim_pair(
    item_text: &str,
    item_entities: &[Entity],
    claim_text: &str,
    claim_entities: &[Entity],
) -> ScoredClaim {
    let item_tokens = tokenize(item_text);
    let claim_tokens = tokenize(claim_text);
    let j = jaccard(&item_tokens, &claim_tokens);
    let overlap = entity_overlap(item_entities, claim_entities);
    let score = (0.6 * j + 0.4 * overlap).clamp(0.0, 1.0);

    let contradiction = overlap >= 0.4 && (has_asymmetric_negation(item_text, claim_text) || has_opposing_pair(item_text, claim_text));

    ScoredClaim {
        score,
        is_contradiction: contradiction,
    }
}

fn has_asymmetric_negation(a: &str, b: &str) -> bool {
    let a_neg = contains_any(a, NEGATION_WORDS);
    let b_neg = contains_any(b, NEGATION_WORDS);
    a_neg != b_neg
}

fn has_opposing_pair(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    OPPOSING_PAIRS.iter().any(|(x, y)| {
        (a_lower.contains(x) && b_lower.contains(y)) || (a_lower.contains(y) && b_lower.contains(x))
    })
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

pub fn build_matched_claim(item_text: &str, claim_text: &str, score: f64) -> Option<MatchedClaim> {
    if score > MIN_MATCH_SCORE {
        Some(MatchedClaim {
            item_claim: truncate(item_text, 100),
            evidence_claim: truncate(claim_text, 200),
            score,
        })
    } else {
        None
    }
}

/// `overallScore = mean(scores)`; tier from `Tier::from_aggregate`.
pub fn aggregate(scores: &[f64]) -> (f64, Tier) {
    if scores.is_empty() {
        return (0.0, Tier::Low);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean, Tier::from_aggregate(scores.len(), mean))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = tokenize("Apple Inc announced new iPhone sales");
        let b = tokenize("Apple Inc announced new iPhone sales");
        assert_eq!(jaccard(&a, &b), 1.0);
    }

    #[test]
    fn cross_language_entity_match() {
        let item = vec![
            Entity { text: "Владимир Путин".into(), kind: EntityType::Person },
            Entity { text: "Москву".into(), kind: EntityType::Loc },
        ];
        let evidence = vec![
            Entity { text: "Vladimir Putin".into(), kind: EntityType::Person },
            Entity { text: "Moscow".into(), kind: EntityType::Loc },
        ];
        let overlap = entity_overlap(&item, &evidence);
        assert!(overlap > 0.0, "expected at least partial cross-language match, got {overlap}");
    }

    #[test]
    fn contradiction_detected_on_opposing_pair() {
        let item_entities = vec![Entity { text: "Stock".into(), kind: EntityType::Org }];
        let claim_entities = vec![Entity { text: "Stock".into(), kind: EntityType::Org }];
        let scored = score_claim_pair(
            "Stock prices rose sharply after the announcement",
            &item_entities,
            "Stock prices fell sharply after the announcement",
            &claim_entities,
        );
        assert!(scored.is_contradiction);
        assert!(scored.score > 0.0);
    }

    #[test]
    fn score_is_always_bounded() {
        let scored = score_claim_pair("a b c", &[], "a b c d e f", &[]);
        assert!((0.0..=1.0).contains(&scored.score));
    }

    #[test]
    fn aggregate_applies_tier_thresholds() {
        let (mean, tier) = aggregate(&[0.6, 0.6]);
        assert_eq!(tier, Tier::High);
        assert!(mean >= 0.5);
    }
}
