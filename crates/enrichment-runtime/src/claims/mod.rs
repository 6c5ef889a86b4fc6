//! Converts article text into `{claims, entities}`. Heuristic path is
//! always available; the LLM path is used when configured and falls
//! back to the heuristic on invalid output.

pub mod entities;
pub mod heuristic;
pub mod llm;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::llm::LlmCompletion;
use crate::types::{ClaimError, ClaimId, Entity, EvidenceClaim, EvidenceId};
use heuristic::Candidate;

pub struct ClaimExtractor<'a> {
    llm: Option<&'a dyn LlmCompletion>,
}

impl<'a> ClaimExtractor<'a> {
    pub fn new(llm: Option<&'a dyn LlmCompletion>) -> Self {
        Self { llm }
    }

    /// Runs the LLM path when configured, falling back to the heuristic
    /// path on any error except cancellation — per spec §7, a cancelled
    /// context propagates out rather than being treated as "LLM invalid
    /// JSON" and silently retried against the fallback.
    pub async fn extract(&self, ctx: CancellationToken, text: &str) -> Result<Vec<Candidate>, ClaimError> {
        if let Some(completion) = self.llm {
            let extractor = llm::LlmClaimExtractor::new(completion);
            match extractor.extract(ctx, text).await {
                Ok(claims) => return Ok(claims),
                Err(ClaimError::Cancelled) => return Err(ClaimError::Cancelled),
                Err(err) => {
                    warn!(error = %err, "llm claim extraction failed, falling back to heuristic");
                }
            }
        }
        Ok(heuristic::extract_claims(text))
    }
}

pub fn candidate_into_claim(candidate: Candidate, evidence_id: EvidenceId) -> EvidenceClaim {
    EvidenceClaim {
        id: ClaimId::new(),
        evidence_id,
        text: candidate.text,
        entities: candidate.entities,
        embedding: None,
    }
}

pub fn dedup_entities(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = std::collections::HashSet::new();
    entities
        .into_iter()
        .filter(|e| seen.insert((e.kind, e.text.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_heuristic_without_llm() {
        let extractor = ClaimExtractor::new(None);
        let claims = extractor
            .extract(
                CancellationToken::new(),
                "Apple Inc announced that iPhone sales rose 15% in Q3 2024.",
            )
            .await
            .unwrap();
        assert!(!claims.is_empty());
    }
}
