//! Core data model for the evidence enrichment pipeline.

pub mod error;
pub mod ids;

pub use error::*;
pub use ids::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a queued enrichment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Done,
    Error,
}

/// A queued item awaiting enrichment. Owned by the storage collaborator;
/// the worker only mutates `status`/`attempt_count`/`last_error`/`next_retry_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub item_id: String,
    pub summary: String,
    pub topic: String,
    pub channel_title: String,
    pub channel_username: String,
    pub raw_message_id: String,
    pub attempt_count: u32,
    pub status: QueueStatus,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// Strategy label stamped onto a generated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    Entity,
    Location,
    Topic,
    Keyword,
    Fallback,
    Translated,
}

impl QueryStrategy {
    /// `<strategy>_translated`, the label an expanded translated query is tagged with.
    pub fn translated_label(self) -> String {
        format!("{}_translated", self.as_str())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStrategy::Entity => "entity",
            QueryStrategy::Location => "location",
            QueryStrategy::Topic => "topic",
            QueryStrategy::Keyword => "keyword",
            QueryStrategy::Fallback => "fallback",
            QueryStrategy::Translated => "translated",
        }
    }
}

/// Ephemeral search query produced by the query generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    pub strategy: String,
    pub language: String,
}

/// Raw hit returned by a search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub domain: String,
    pub published_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub score: Option<f64>,
}

/// Persisted evidence source, keyed by `url_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub id: EvidenceId,
    pub url: String,
    pub url_hash: UrlHash,
    pub domain: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub language: String,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub extraction_failed: bool,
}

impl EvidenceSource {
    /// `url_hash` uniqueness is enforced by storage; this checks the two
    /// invariants the pipeline itself is responsible for.
    pub fn invariants_hold(&self) -> bool {
        let expiry_ok = self.expires_at > self.fetched_at;
        let content_ok = !self.extraction_failed || self.content.is_empty();
        expiry_ok && content_ok
    }
}

/// Entity type recognized by the claim extractor and scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Person,
    Org,
    Loc,
    Money,
    Percent,
}

/// A named entity extracted from a claim's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
}

/// A factual sentence extracted from an evidence source. Ordered
/// insertion only; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceClaim {
    pub id: ClaimId,
    pub evidence_id: EvidenceId,
    pub text: String,
    pub entities: Vec<Entity>,
    pub embedding: Option<Vec<f32>>,
}

/// One matched pair recorded when its score exceeds `min_match_score` (0.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedClaim {
    pub item_claim: String,
    pub evidence_claim: String,
    pub score: f64,
}

/// Coarse verdict derived from source count and mean agreement score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn from_aggregate(source_count: usize, overall_score: f64) -> Self {
        if source_count >= 2 && overall_score >= 0.5 {
            Tier::High
        } else if source_count >= 1 && overall_score >= 0.3 {
            Tier::Medium
        } else {
            Tier::Low
        }
    }
}

/// Link row between a queue item and one evidence source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEvidence {
    pub item_id: String,
    pub evidence_id: EvidenceId,
    pub agreement_score: f64,
    pub is_contradiction: bool,
    pub matched_claims: Vec<MatchedClaim>,
    pub matched_at: DateTime<Utc>,
}

/// Resolved links attached to the raw message, used to seed query
/// generation when the summary alone is too short or signal-poor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub url: String,
    pub title: String,
    pub content: String,
    pub word_count: usize,
    pub language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::from_aggregate(2, 0.5), Tier::High);
        assert_eq!(Tier::from_aggregate(1, 0.5), Tier::Medium);
        assert_eq!(Tier::from_aggregate(1, 0.3), Tier::Medium);
        assert_eq!(Tier::from_aggregate(0, 0.9), Tier::Low);
        assert_eq!(Tier::from_aggregate(2, 0.49), Tier::Medium);
    }

    #[test]
    fn evidence_source_invariants() {
        let now = Utc::now();
        let mut src = EvidenceSource {
            id: EvidenceId::new(),
            url: "https://example.com".into(),
            url_hash: UrlHash::of("https://example.com"),
            domain: "example.com".into(),
            title: String::new(),
            description: String::new(),
            content: "body".into(),
            author: String::new(),
            published_at: None,
            language: "en".into(),
            provider: "gdelt".into(),
            fetched_at: now,
            expires_at: now + chrono::Duration::hours(1),
            extraction_failed: false,
        };
        assert!(src.invariants_hold());
        src.extraction_failed = true;
        assert!(!src.invariants_hold());
        src.content.clear();
        assert!(src.invariants_hold());
    }
}
