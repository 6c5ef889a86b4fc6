//! Benchmarks for the two hot, input-scaling paths in the enrichment
//! pipeline: the scorer's tokenizer/Jaccard pass over claim text, and the
//! claim-dedup similarity scan over a growing pool of embeddings.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use enrichment_runtime::embedding::cosine_similarity;
use enrichment_runtime::scorer::{jaccard, score_claim_pair, tokenize};
use enrichment_runtime::types::{Entity, EntityType};

fn sample_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| {
            format!(
                "Reuters reported that the government announced new measures on day {i} \
                 affecting trade and economic growth across the region"
            )
        })
        .collect::<Vec<_>>()
        .join(". ")
}

fn sample_entities() -> Vec<Entity> {
    vec![
        Entity { text: "Reuters".into(), kind: EntityType::Org },
        Entity { text: "the government".into(), kind: EntityType::Org },
    ]
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("scorer_tokenize");
    for sentences in [1usize, 10, 50] {
        let text = sample_text(sentences);
        group.bench_function(format!("{sentences}_sentences"), |b| {
            b.iter(|| tokenize(&text))
        });
    }
    group.finish();
}

fn bench_jaccard(c: &mut Criterion) {
    let item = tokenize(&sample_text(20));
    let claim = tokenize(&sample_text(18));
    c.bench_function("scorer_jaccard_20_vs_18_sentences", |b| {
        b.iter(|| jaccard(&item, &claim))
    });
}

fn bench_score_claim_pair(c: &mut Criterion) {
    let item_text = sample_text(5);
    let claim_text = sample_text(4);
    let item_entities = sample_entities();
    let claim_entities = sample_entities();
    c.bench_function("scorer_score_claim_pair", |b| {
        b.iter(|| score_claim_pair(&item_text, &item_entities, &claim_text, &claim_entities))
    });
}

/// Mirrors `InMemoryStore::deduplicate_evidence_claims`'s linear scan of
/// each new claim's embedding against every already-kept claim.
fn bench_claim_dedup_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_dedup_scan");
    for pool_size in [10usize, 100, 500] {
        let pool: Vec<Vec<f32>> = (0..pool_size)
            .map(|i| {
                let mut v = vec![0f32; 32];
                v[i % 32] = 1.0;
                v
            })
            .collect();
        let candidate = vec![0.5f32; 32];
        group.bench_function(format!("{pool_size}_kept_claims"), |b| {
            b.iter_batched(
                || (pool.clone(), candidate.clone()),
                |(pool, candidate)| {
                    pool.iter().any(|kept| cosine_similarity(kept, &candidate) >= 0.9)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_jaccard,
    bench_score_claim_pair,
    bench_claim_dedup_scan
);
criterion_main!(benches);
