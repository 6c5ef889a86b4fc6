//! Property-style invariants from the scoring and claim-dedup math that
//! naturally generalize over inputs rather than one fixed example.

use proptest::prelude::*;

use enrichment_runtime::embedding::cosine_similarity;
use enrichment_runtime::scorer::score_claim_pair;
use enrichment_runtime::store::{EnrichmentStore, InMemoryStore};
use enrichment_runtime::types::{ClaimId, Entity, EntityType, EvidenceClaim, EvidenceId, Tier};

fn tier_rank(tier: Tier) -> u8 {
    match tier {
        Tier::Low => 0,
        Tier::Medium => 1,
        Tier::High => 2,
    }
}

fn arb_entity() -> impl Strategy<Value = Entity> {
    ("[a-zA-Z ]{0,12}", 0..5u8).prop_map(|(text, kind)| Entity {
        text,
        kind: match kind {
            0 => EntityType::Person,
            1 => EntityType::Org,
            2 => EntityType::Loc,
            3 => EntityType::Money,
            _ => EntityType::Percent,
        },
    })
}

proptest! {
    /// `agreementScore` is always clamped to `[0, 1]` regardless of how
    /// unrelated or overlapping the item/claim text and entities are.
    #[test]
    fn agreement_score_is_always_bounded(
        item_text in ".{0,200}",
        claim_text in ".{0,200}",
        item_entities in prop::collection::vec(arb_entity(), 0..5),
        claim_entities in prop::collection::vec(arb_entity(), 0..5),
    ) {
        let scored = score_claim_pair(&item_text, &item_entities, &claim_text, &claim_entities);
        prop_assert!((0.0..=1.0).contains(&scored.score));
    }

    /// For a fixed source count, `Tier::from_aggregate` never drops to a
    /// *lower* tier as the mean agreement score increases.
    #[test]
    fn tier_is_monotonic_in_score(
        source_count in 0usize..5,
        mut scores in prop::collection::vec(0.0..1.0f64, 2),
    ) {
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let low = Tier::from_aggregate(source_count, scores[0]);
        let high = Tier::from_aggregate(source_count, scores[1]);
        prop_assert!(tier_rank(high) >= tier_rank(low));
    }

    /// For a fixed mean score, more corroborating sources never lowers
    /// the tier.
    #[test]
    fn tier_is_monotonic_in_source_count(
        mut counts in prop::collection::vec(0usize..5, 2),
        score in 0.0..1.0f64,
    ) {
        counts.sort_unstable();
        let low = Tier::from_aggregate(counts[0], score);
        let high = Tier::from_aggregate(counts[1], score);
        prop_assert!(tier_rank(high) >= tier_rank(low));
    }

    /// After `deduplicate_evidence_claims(threshold)`, no two claims that
    /// survive under the same evidence source have a cosine similarity at
    /// or above `threshold` — the scan's pairwise guarantee must hold no
    /// matter how many near-identical embeddings were fed in.
    #[test]
    fn dedup_leaves_no_pair_above_threshold(
        embeddings in prop::collection::vec(prop::collection::vec(-1.0..1.0f32, 4), 1..12),
    ) {
        let threshold = 0.95f32;
        let store = InMemoryStore::new();
        let evidence_id = EvidenceId::new();

        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(async {
                for embedding in &embeddings {
                    let claim = EvidenceClaim {
                        id: ClaimId::new(),
                        evidence_id,
                        text: "claim".into(),
                        entities: vec![],
                        embedding: Some(embedding.clone()),
                    };
                    store.save_evidence_claim(&claim).await.unwrap();
                }
                store.deduplicate_evidence_claims(threshold).await.unwrap();

                let kept = store.claims_for(evidence_id);
                for i in 0..kept.len() {
                    for j in (i + 1)..kept.len() {
                        let (a, b) = (kept[i].embedding.as_ref().unwrap(), kept[j].embedding.as_ref().unwrap());
                        prop_assert!(cosine_similarity(a, b) < threshold);
                    }
                }
                Ok(())
            })?;
    }
}
