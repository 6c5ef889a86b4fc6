//! The worker's sole persistent-state collaborator.
//!
//! `EnrichmentStore` is the queue/evidence storage contract; this crate
//! does not ship a production implementation (the database is an
//! external collaborator), only the trait and an `InMemoryStore` used
//! by tests and examples.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::types::{
    EvidenceClaim, EvidenceId, EvidenceSource, ItemEvidence, QueueItem, QueueItemId, QueueStatus,
    ResolvedLink, StoreError, Tier, UrlHash,
};

#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Atomically claims and returns the oldest pending/retryable item,
    /// or `None` if the queue is empty.
    async fn claim_next_enrichment(&self) -> Result<Option<QueueItem>, StoreError>;

    async fn update_enrichment_status(
        &self,
        queue_id: QueueItemId,
        status: QueueStatus,
        err: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn get_evidence_source(&self, url_hash: UrlHash) -> Result<Option<EvidenceSource>, StoreError>;

    async fn save_evidence_source(&self, source: &EvidenceSource) -> Result<(), StoreError>;

    async fn delete_expired_evidence_sources(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn cleanup_excess_evidence_per_item(&self, max: usize) -> Result<u64, StoreError>;

    async fn deduplicate_evidence_claims(&self, threshold: f32) -> Result<u64, StoreError>;

    async fn save_evidence_claim(&self, claim: &EvidenceClaim) -> Result<(), StoreError>;

    /// Looks up an existing claim under the same evidence source whose
    /// embedding cosine similarity meets `threshold`.
    async fn find_similar_claim(
        &self,
        evidence_id: EvidenceId,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<EvidenceClaim>, StoreError>;

    async fn save_item_evidence(&self, link: &ItemEvidence) -> Result<(), StoreError>;

    async fn update_item_fact_check_score(
        &self,
        item_id: &str,
        score: f64,
        tier: Tier,
        notes: &str,
    ) -> Result<(), StoreError>;

    async fn get_daily_enrichment_count(&self) -> Result<u64, StoreError>;
    async fn get_monthly_enrichment_count(&self) -> Result<u64, StoreError>;
    async fn get_daily_enrichment_cost(&self) -> Result<f64, StoreError>;
    async fn get_monthly_enrichment_cost(&self) -> Result<f64, StoreError>;
    async fn increment_enrichment_usage(&self, provider: &str, cost: f64) -> Result<(), StoreError>;
    async fn increment_embedding_usage(&self, cost: f64) -> Result<(), StoreError>;

    async fn get_links_for_message(&self, msg_id: &str) -> Result<Vec<ResolvedLink>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn get_translation(&self, text: &str, target_lang: &str) -> Result<Option<String>, StoreError>;
    async fn save_translation(
        &self,
        text: &str,
        target_lang: &str,
        translated: &str,
        ttl: chrono::Duration,
    ) -> Result<(), StoreError>;
}

/// Reference implementation for tests and examples. Not production
/// storage: everything lives in process memory behind a single mutex.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    queue: Vec<QueueItem>,
    sources: HashMap<UrlHash, EvidenceSource>,
    claims: HashMap<EvidenceId, Vec<EvidenceClaim>>,
    item_evidence: Vec<ItemEvidence>,
    item_scores: HashMap<String, (f64, Tier, String)>,
    daily_count: u64,
    monthly_count: u64,
    daily_cost: f64,
    monthly_cost: f64,
    links: HashMap<String, Vec<ResolvedLink>>,
    settings: HashMap<String, String>,
    translations: HashMap<(String, String), (String, DateTime<Utc>)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_queue_item(&self, item: QueueItem) {
        self.inner.lock().unwrap().queue.push(item);
    }

    pub fn seed_links(&self, msg_id: &str, links: Vec<ResolvedLink>) {
        self.inner
            .lock()
            .unwrap()
            .links
            .insert(msg_id.to_string(), links);
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert(key.to_string(), value.to_string());
    }

    pub fn item_evidence_count(&self, item_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .item_evidence
            .iter()
            .filter(|e| e.item_id == item_id)
            .count()
    }

    pub fn score_of(&self, item_id: &str) -> Option<(f64, Tier, String)> {
        self.inner.lock().unwrap().item_scores.get(item_id).cloned()
    }

    pub fn claims_for(&self, evidence_id: EvidenceId) -> Vec<EvidenceClaim> {
        self.inner
            .lock()
            .unwrap()
            .claims
            .get(&evidence_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EnrichmentStore for InMemoryStore {
    async fn claim_next_enrichment(&self) -> Result<Option<QueueItem>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let now = Utc::now();
        let idx = state.queue.iter().position(|i| {
            matches!(i.status, QueueStatus::Pending)
                && i.next_retry_at.map(|t| t <= now).unwrap_or(true)
        });
        match idx {
            Some(i) => {
                state.queue[i].status = QueueStatus::Processing;
                Ok(Some(state.queue[i].clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_enrichment_status(
        &self,
        queue_id: QueueItemId,
        status: QueueStatus,
        err: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let item = state
            .queue
            .iter_mut()
            .find(|i| i.id == queue_id)
            .ok_or_else(|| StoreError::NotFound(queue_id.to_string()))?;
        item.status = status;
        item.last_error = err;
        item.next_retry_at = next_retry_at;
        if matches!(status, QueueStatus::Pending) {
            item.attempt_count += 1;
        }
        Ok(())
    }

    async fn get_evidence_source(&self, url_hash: UrlHash) -> Result<Option<EvidenceSource>, StoreError> {
        Ok(self.inner.lock().unwrap().sources.get(&url_hash).cloned())
    }

    async fn save_evidence_source(&self, source: &EvidenceSource) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .insert(source.url_hash, source.clone());
        Ok(())
    }

    async fn delete_expired_evidence_sources(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.sources.len();
        state.sources.retain(|_, s| s.expires_at > now);
        Ok((before - state.sources.len()) as u64)
    }

    async fn cleanup_excess_evidence_per_item(&self, max: usize) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut per_item: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, ev) in state.item_evidence.iter().enumerate() {
            per_item.entry(ev.item_id.clone()).or_default().push(idx);
        }
        let mut to_remove = Vec::new();
        for (_, mut idxs) in per_item {
            idxs.sort_by(|a, b| {
                state.item_evidence[*b]
                    .matched_at
                    .cmp(&state.item_evidence[*a].matched_at)
            });
            if idxs.len() > max {
                to_remove.extend(idxs[max..].iter().copied());
            }
        }
        to_remove.sort_unstable_by(|a, b| b.cmp(a));
        let removed = to_remove.len() as u64;
        for idx in to_remove {
            state.item_evidence.remove(idx);
        }
        Ok(removed)
    }

    async fn deduplicate_evidence_claims(&self, threshold: f32) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut removed = 0u64;
        for claims in state.claims.values_mut() {
            let mut kept: Vec<EvidenceClaim> = Vec::new();
            for claim in claims.drain(..) {
                let is_dup = match &claim.embedding {
                    Some(emb) => kept.iter().any(|k| {
                        k.embedding
                            .as_ref()
                            .map(|ke| cosine_similarity(ke, emb) >= threshold)
                            .unwrap_or(false)
                    }),
                    None => false,
                };
                if is_dup {
                    removed += 1;
                } else {
                    kept.push(claim);
                }
            }
            *claims = kept;
        }
        Ok(removed)
    }

    async fn save_evidence_claim(&self, claim: &EvidenceClaim) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .claims
            .entry(claim.evidence_id)
            .or_default()
            .push(claim.clone());
        Ok(())
    }

    async fn find_similar_claim(
        &self,
        evidence_id: EvidenceId,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<EvidenceClaim>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state.claims.get(&evidence_id).and_then(|claims| {
            claims.iter().find(|c| {
                c.embedding
                    .as_ref()
                    .map(|e| cosine_similarity(e, embedding) >= threshold)
                    .unwrap_or(false)
            })
        }).cloned())
    }

    async fn save_item_evidence(&self, link: &ItemEvidence) -> Result<(), StoreError> {
        self.inner.lock().unwrap().item_evidence.push(link.clone());
        Ok(())
    }

    async fn update_item_fact_check_score(
        &self,
        item_id: &str,
        score: f64,
        tier: Tier,
        notes: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .item_scores
            .insert(item_id.to_string(), (score, tier, notes.to_string()));
        Ok(())
    }

    async fn get_daily_enrichment_count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().daily_count)
    }

    async fn get_monthly_enrichment_count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().monthly_count)
    }

    async fn get_daily_enrichment_cost(&self) -> Result<f64, StoreError> {
        Ok(self.inner.lock().unwrap().daily_cost)
    }

    async fn get_monthly_enrichment_cost(&self) -> Result<f64, StoreError> {
        Ok(self.inner.lock().unwrap().monthly_cost)
    }

    async fn increment_enrichment_usage(&self, _provider: &str, cost: f64) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.daily_count += 1;
        state.monthly_count += 1;
        state.daily_cost += cost;
        state.monthly_cost += cost;
        Ok(())
    }

    async fn increment_embedding_usage(&self, cost: f64) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.daily_cost += cost;
        state.monthly_cost += cost;
        Ok(())
    }

    async fn get_links_for_message(&self, msg_id: &str) -> Result<Vec<ResolvedLink>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .links
            .get(msg_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().settings.get(key).cloned())
    }

    async fn get_translation(&self, text: &str, target_lang: &str) -> Result<Option<String>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .translations
            .get(&(text.to_string(), target_lang.to_string()))
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(t, _)| t.clone()))
    }

    async fn save_translation(
        &self,
        text: &str,
        target_lang: &str,
        translated: &str,
        ttl: chrono::Duration,
    ) -> Result<(), StoreError> {
        self.inner.lock().unwrap().translations.insert(
            (text.to_string(), target_lang.to_string()),
            (translated.to_string(), Utc::now() + ttl),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueItemId;

    fn sample_item() -> QueueItem {
        QueueItem {
            id: QueueItemId::new(),
            item_id: "m1".into(),
            summary: "Apple Inc announced new iPhone sales increased by 15% in Q3 2024".into(),
            topic: "Technology".into(),
            channel_title: String::new(),
            channel_username: String::new(),
            raw_message_id: "raw1".into(),
            attempt_count: 0,
            status: QueueStatus::Pending,
            last_error: None,
            next_retry_at: None,
        }
    }

    #[tokio::test]
    async fn claim_next_returns_and_marks_processing() {
        let store = InMemoryStore::new();
        store.seed_queue_item(sample_item());
        let claimed = store.claim_next_enrichment().await.unwrap();
        assert!(claimed.is_some());
        assert!(store.claim_next_enrichment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn translation_cache_respects_ttl() {
        let store = InMemoryStore::new();
        store
            .save_translation("hello", "ru", "привет", chrono::Duration::seconds(-1))
            .await
            .unwrap();
        assert!(store.get_translation("hello", "ru").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dedup_removes_high_similarity_claims() {
        let store = InMemoryStore::new();
        let evidence_id = EvidenceId::new();
        let a = EvidenceClaim {
            id: crate::types::ClaimId::new(),
            evidence_id,
            text: "a".into(),
            entities: vec![],
            embedding: Some(vec![1.0, 0.0]),
        };
        let b = EvidenceClaim {
            id: crate::types::ClaimId::new(),
            evidence_id,
            text: "b".into(),
            entities: vec![],
            embedding: Some(vec![1.0, 0.0001]),
        };
        store.save_evidence_claim(&a).await.unwrap();
        store.save_evidence_claim(&b).await.unwrap();
        let removed = store.deduplicate_evidence_claims(0.98).await.unwrap();
        assert_eq!(removed, 1);
    }
}
