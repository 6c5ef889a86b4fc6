//! The enrichment worker: a single long-running loop that claims queue
//! items and drives query generation, provider fan-out, content
//! extraction, claim scoring, and persistence.

pub mod budget;
pub mod domain_filter;
pub mod navigation;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::claims::{candidate_into_claim, ClaimExtractor};
use crate::config::WorkerConfig;
use crate::embedding::EmbeddingProvider;
use crate::extractor::ContentExtractor;
use crate::llm::LlmCompletion;
use crate::metrics::Metrics;
use crate::providers::Registry;
use crate::query::expand::Expander;
use crate::query::QueryGenerator;
use crate::scorer;
use crate::store::EnrichmentStore;
use crate::translate::Translator;
use crate::types::{
    EnrichmentError, EvidenceId, EvidenceSource, ItemEvidence, QueueItem, QueueStatus, UrlHash,
};

use domain_filter::{DomainFilter, DomainFilterHolder};

pub struct EnrichmentWorker {
    config: WorkerConfig,
    store: Arc<dyn EnrichmentStore>,
    registry: Arc<Registry>,
    llm: Option<Arc<dyn LlmCompletion>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    translator: Option<Arc<dyn Translator>>,
    metrics: Arc<dyn Metrics>,
    extractor: ContentExtractor,
    domain_filter: DomainFilterHolder,
}

struct CollectedResult {
    url: String,
    title: String,
    description: String,
    provider: String,
}

impl EnrichmentWorker {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn EnrichmentStore>,
        registry: Arc<Registry>,
        llm: Option<Arc<dyn LlmCompletion>>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
        translator: Option<Arc<dyn Translator>>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        let domain_filter = DomainFilterHolder::new(DomainFilter::from_config(&config.domains));
        Self {
            extractor: ContentExtractor::new(20_000),
            config,
            store,
            registry,
            llm,
            embedding,
            translator,
            metrics,
            domain_filter,
        }
    }

    /// The single long-running loop. Returns only on cancellation.
    #[instrument(skip(self, ctx))]
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), EnrichmentError> {
        if !self.config.enabled {
            info!("enrichment worker disabled by configuration");
            return Ok(());
        }
        if self.registry.available_providers(ctx.clone()).await.is_empty() {
            warn!("no search providers available at startup");
        }
        self.domain_filter
            .reload_from_store(self.store.as_ref(), &self.config.domains)
            .await;

        let mut last_budget_check = Instant::now() - self.config.budget_check_interval;
        let mut last_domain_reload = Instant::now();
        let mut last_cleanup = Instant::now();

        loop {
            if ctx.is_cancelled() {
                info!("enrichment worker shutting down");
                return Ok(());
            }

            if last_budget_check.elapsed() >= self.config.budget_check_interval {
                last_budget_check = Instant::now();
                if let Err(reason) = budget::check_budget(self.store.as_ref(), &self.config.budget).await {
                    warn!(%reason, "budget gate tripped, pausing");
                    self.sleep_cancellable(ctx.clone(), self.config.budget_check_interval).await;
                    continue;
                }
            }

            if last_domain_reload.elapsed() >= self.config.domain_filter_reload_interval {
                last_domain_reload = Instant::now();
                self.domain_filter
                    .reload_from_store(self.store.as_ref(), &self.config.domains)
                    .await;
            }

            let item = match self.store.claim_next_enrichment().await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    self.sleep_cancellable(ctx.clone(), self.config.poll_interval).await;
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "failed to claim next queue item");
                    self.sleep_cancellable(ctx.clone(), self.config.poll_interval).await;
                    continue;
                }
            };

            let item_ctx = ctx.child_token();
            let deadline = tokio::time::sleep(self.config.item_timeout);
            tokio::pin!(deadline);

            let outcome = tokio::select! {
                result = self.process_item(item_ctx.clone(), &item) => result,
                _ = &mut deadline => Err(EnrichmentError::ItemDeadlineExceeded(item.id)),
            };
            item_ctx.cancel();

            self.finalize_item(&item, outcome).await;

            if last_cleanup.elapsed() >= self.config.cleanup_interval {
                last_cleanup = Instant::now();
                self.run_cleanup().await;
                self.metrics.flush();
            }
        }
    }

    async fn sleep_cancellable(&self, ctx: CancellationToken, duration: Duration) {
        tokio::select! {
            _ = ctx.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    async fn finalize_item(&self, item: &QueueItem, outcome: Result<(), EnrichmentError>) {
        let (status, err, next_retry_at) = match outcome {
            Ok(()) => (QueueStatus::Done, None, None),
            Err(err) => {
                warn!(item_id = %item.item_id, error = %err, "enrichment item failed");
                if item.attempt_count + 1 >= self.config.max_attempts {
                    (QueueStatus::Error, Some(err.to_string()), None)
                } else {
                    let retry_at = Utc::now() + chrono::Duration::from_std(self.config.retry_backoff).unwrap_or_default();
                    (QueueStatus::Pending, Some(err.to_string()), Some(retry_at))
                }
            }
        };
        if let Err(store_err) = self
            .store
            .update_enrichment_status(item.id, status, err, next_retry_at)
            .await
        {
            warn!(item_id = %item.item_id, error = %store_err, "failed to update queue status");
        }
    }

    async fn run_cleanup(&self) {
        let now = Utc::now();
        if let Ok(n) = self.store.delete_expired_evidence_sources(now).await {
            if n > 0 {
                debug!(count = n, "deleted expired evidence sources");
            }
        }
        let _ = self
            .store
            .cleanup_excess_evidence_per_item(self.config.max_evidence_per_item)
            .await;
        let _ = self
            .store
            .deduplicate_evidence_claims(self.config.dedup_similarity as f32)
            .await;
    }

    async fn process_item(&self, ctx: CancellationToken, item: &QueueItem) -> Result<(), EnrichmentError> {
        let cleaned = crate::query::clean_text(&item.summary);
        let item_language = crate::extractor::lang::detect_language(&cleaned);

        let resolved_links = if self.config.link_enrichment.enabled {
            self.gather_links(item, item_language.as_deref()).await
        } else {
            Vec::new()
        };

        let mut queries = QueryGenerator::generate(&item.summary, &item.topic, &item.channel_title, &resolved_links);
        if queries.is_empty() {
            let language = item_language.clone().unwrap_or_else(|| "unknown".to_string());
            let mut fallback = String::new();
            if !item.channel_title.is_empty() {
                fallback.push_str(&item.channel_title);
                fallback.push(' ');
            }
            fallback.push_str(&cleaned);
            queries.push(crate::types::GeneratedQuery {
                query: fallback,
                strategy: "fallback".to_string(),
                language,
            });
        }

        if self.config.query_translate {
            if let Some(translator) = &self.translator {
                let expander = Expander::new(self.store.as_ref(), translator.as_ref());
                let target_langs = self.config.language_routing.resolve(
                    &item.channel_username,
                    &item.topic,
                    &item.summary,
                );
                queries = expander.expand(ctx.clone(), queries, &target_langs, 8).await;
            }
        }

        let (results, last_provider, last_error) = self.fan_out_search(ctx.clone(), &queries).await;
        if results.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
            return Ok(());
        }
        debug!(item_id = %item.item_id, provider = %last_provider, count = results.len(), "search fan-out complete");

        let survivors = self.process_results(ctx.clone(), item, results).await?;

        if !survivors.is_empty() {
            let (overall_score, tier) = scorer::aggregate(&survivors);
            self.store
                .update_item_fact_check_score(&item.item_id, overall_score, tier, "")
                .await?;
        }

        Ok(())
    }

    /// Filters to links with `word_count ≥ minWords` and, when both the
    /// link's and the item's language are known, a matching language
    /// (§4.8 step 4).
    async fn gather_links(&self, item: &QueueItem, item_language: Option<&str>) -> Vec<crate::types::ResolvedLink> {
        let links = self
            .store
            .get_links_for_message(&item.raw_message_id)
            .await
            .unwrap_or_default();
        links
            .into_iter()
            .filter(|l| l.word_count >= self.config.link_enrichment.min_words)
            .filter(|l| match (item_language, l.language.as_deref()) {
                (Some(item_lang), Some(link_lang)) => item_lang == link_lang,
                _ => true,
            })
            .collect()
    }

    async fn fan_out_search(
        &self,
        ctx: CancellationToken,
        queries: &[crate::types::GeneratedQuery],
    ) -> (Vec<CollectedResult>, String, Option<EnrichmentError>) {
        let seen_urls: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let collected: Arc<Mutex<Vec<CollectedResult>>> = Arc::new(Mutex::new(Vec::new()));
        let last_provider: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
        let last_error: Arc<Mutex<Option<EnrichmentError>>> = Arc::new(Mutex::new(None));
        let filter = self.domain_filter.current();

        let tasks = queries.iter().map(|query| {
            let registry = self.registry.clone();
            let store = self.store.clone();
            let ctx = ctx.clone();
            let query_text = query.query.clone();
            let language = query.language.clone();
            let max_results = self.config.max_results_per_query;
            let seen_urls = seen_urls.clone();
            let collected = collected.clone();
            let last_provider = last_provider.clone();
            let last_error = last_error.clone();
            let filter = filter.clone();

            async move {
                let lang_opt = if language == "unknown" { None } else { Some(language.as_str()) };
                match registry.search_with_fallback(ctx, &query_text, lang_opt, max_results).await {
                    Ok((search_results, provider_name)) => {
                        *last_provider.lock() = provider_name.clone();
                        let cost = crate::providers::provider_cost_estimate(&provider_name);
                        let _ = store.increment_enrichment_usage(&provider_name, cost).await;
                        let mut seen = seen_urls.lock();
                        let mut out = collected.lock();
                        for result in search_results {
                            if !seen.insert(result.url.clone()) {
                                continue;
                            }
                            if !filter.allows(&result.domain) {
                                continue;
                            }
                            if navigation::is_navigation_url(&result.url) {
                                continue;
                            }
                            out.push(CollectedResult {
                                url: result.url,
                                title: result.title,
                                description: result.description,
                                provider: provider_name.clone(),
                            });
                        }
                    }
                    Err(err) => {
                        *last_error.lock() = Some(err);
                    }
                }
            }
        });

        join_all(tasks).await;

        let results = Arc::try_unwrap(collected).map(|m| m.into_inner()).unwrap_or_default();
        let provider = Arc::try_unwrap(last_provider).map(|m| m.into_inner()).unwrap_or_default();
        let error = Arc::try_unwrap(last_error).map(|m| m.into_inner()).unwrap_or(None);
        (results, provider, error)
    }

    async fn process_results(
        &self,
        ctx: CancellationToken,
        item: &QueueItem,
        results: Vec<CollectedResult>,
    ) -> Result<Vec<f64>, EnrichmentError> {
        let cap = 2 * self.config.max_evidence_per_item;
        let batch: Vec<CollectedResult> = results.into_iter().take(cap).collect();

        let source_count = Arc::new(Mutex::new(0usize));
        let scores = Arc::new(Mutex::new(Vec::<f64>::new()));

        let tasks = batch.into_iter().map(|result| {
            let ctx = ctx.clone();
            let source_count = source_count.clone();
            let scores = scores.clone();
            async move {
                if let Err(err) = self
                    .process_one_result(ctx, item, result, &source_count, &scores)
                    .await
                {
                    debug!(error = %err, "evidence candidate skipped");
                }
            }
        });

        join_all(tasks).await;

        let scores = Arc::try_unwrap(scores).map(|m| m.into_inner()).unwrap_or_default();
        Ok(scores)
    }

    async fn process_one_result(
        &self,
        ctx: CancellationToken,
        item: &QueueItem,
        result: CollectedResult,
        source_count: &Arc<Mutex<usize>>,
        scores: &Arc<Mutex<Vec<f64>>>,
    ) -> Result<(), EnrichmentError> {
        let url_hash = UrlHash::of(&result.url);
        let now = Utc::now();

        let source = match self.store.get_evidence_source(url_hash).await? {
            Some(existing) if existing.expires_at > now => existing,
            _ => self.fetch_and_persist_source(ctx.clone(), &result, url_hash).await?,
        };

        if source.extraction_failed {
            return Ok(());
        }

        let claim_extractor = ClaimExtractor::new(self.llm.as_deref());
        let candidates = match claim_extractor.extract(ctx.clone(), &source.content).await {
            Ok(candidates) => candidates,
            Err(crate::types::ClaimError::Cancelled) => return Err(EnrichmentError::Cancelled),
            Err(err) => {
                debug!(error = %err, "claim extraction failed");
                Vec::new()
            }
        };

        let mut best_score = 0.0f64;
        let mut best_contradiction = false;

        for candidate in candidates {
            let embedding = match &self.embedding {
                Some(provider) => match provider.get_embedding(&candidate.text).await {
                    Ok(vector) => {
                        let _ = self
                            .store
                            .increment_embedding_usage(crate::embedding::EMBEDDING_COST_PER_CALL)
                            .await;
                        Some(vector)
                    }
                    Err(_) => None,
                },
                None => None,
            };

            if let Some(vector) = &embedding {
                if let Ok(Some(_similar)) = self
                    .store
                    .find_similar_claim(source.id, vector, self.config.dedup_similarity as f32)
                    .await
                {
                    continue;
                }
            }

            let item_entities = crate::claims::entities::extract_entities(&item.summary);
            let scored = scorer::score_claim_pair(&item.summary, &item_entities, &candidate.text, &candidate.entities);

            if scored.score > best_score {
                best_score = scored.score;
                best_contradiction = scored.is_contradiction;
            }

            let mut claim = candidate_into_claim(candidate, source.id);
            claim.embedding = embedding;
            let _ = self.store.save_evidence_claim(&claim).await;
        }

        if best_score < self.config.min_agreement {
            return Ok(());
        }

        let mut slot_reserved = false;
        {
            let mut count = source_count.lock();
            if *count < self.config.max_evidence_per_item {
                *count += 1;
                slot_reserved = true;
            }
        }
        if !slot_reserved {
            return Ok(());
        }

        let matched = scorer::build_matched_claim(&item.summary, &source.content, best_score)
            .into_iter()
            .collect();

        let link = ItemEvidence {
            item_id: item.item_id.clone(),
            evidence_id: source.id,
            agreement_score: best_score,
            is_contradiction: best_contradiction,
            matched_claims: matched,
            matched_at: now,
        };
        self.store.save_item_evidence(&link).await?;
        scores.lock().push(best_score);
        self.metrics
            .incr_counter("enrichment_evidence_saved", &[("provider", source.provider.as_str())]);

        Ok(())
    }

    async fn fetch_and_persist_source(
        &self,
        ctx: CancellationToken,
        result: &CollectedResult,
        url_hash: UrlHash,
    ) -> Result<EvidenceSource, EnrichmentError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.config.cache_ttl).unwrap_or_default();

        let source = match self.extractor.extract(ctx, &result.url).await {
            Ok(extracted) => EvidenceSource {
                id: EvidenceId::new(),
                url: result.url.clone(),
                url_hash,
                domain: crate::providers::domain_of(&result.url),
                title: if extracted.title.is_empty() { result.title.clone() } else { extracted.title },
                description: if extracted.description.is_empty() { result.description.clone() } else { extracted.description },
                content: extracted.content,
                author: extracted.author,
                published_at: extracted.published_at,
                language: extracted.language,
                provider: result.provider.clone(),
                fetched_at: now,
                expires_at,
                extraction_failed: false,
            },
            Err(crate::types::ExtractError::Cancelled) => return Err(EnrichmentError::Cancelled),
            Err(err) => {
                debug!(url = %result.url, error = %err, "content extraction failed");
                EvidenceSource {
                    id: EvidenceId::new(),
                    url: result.url.clone(),
                    url_hash,
                    domain: crate::providers::domain_of(&result.url),
                    title: result.title.clone(),
                    description: result.description.clone(),
                    content: String::new(),
                    author: String::new(),
                    published_at: None,
                    language: String::new(),
                    provider: result.provider.clone(),
                    fetched_at: now,
                    expires_at,
                    extraction_failed: true,
                }
            }
        };

        self.store.save_evidence_source(&source).await?;
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreakerConfig;
    use crate::metrics::NoopMetrics;
    use crate::store::InMemoryStore;
    use crate::types::{QueueItemId, QueueStatus};

    fn make_worker(store: Arc<dyn EnrichmentStore>) -> EnrichmentWorker {
        let registry = Arc::new(Registry::new(CircuitBreakerConfig::default()));
        EnrichmentWorker::new(
            WorkerConfig::default(),
            store,
            registry,
            None,
            None,
            None,
            Arc::new(NoopMetrics),
        )
    }

    #[tokio::test]
    async fn run_exits_immediately_when_disabled() {
        let mut config = WorkerConfig::default();
        config.enabled = false;
        let store: Arc<dyn EnrichmentStore> = Arc::new(InMemoryStore::default());
        let registry = Arc::new(Registry::new(CircuitBreakerConfig::default()));
        let worker = EnrichmentWorker::new(config, store, registry, None, None, None, Arc::new(NoopMetrics));
        let ctx = CancellationToken::new();
        assert!(worker.run(ctx).await.is_ok());
    }

    #[tokio::test]
    async fn process_item_with_no_providers_returns_no_providers_error() {
        let store = InMemoryStore::default();
        store.seed_queue_item(QueueItem {
            id: QueueItemId::new(),
            item_id: "m1".into(),
            summary: "Apple Inc announced new iPhone sales increased by 15% in Q3 2024".into(),
            topic: "Technology".into(),
            channel_title: "TechNews".into(),
            channel_username: "technews".into(),
            raw_message_id: "raw1".into(),
            attempt_count: 0,
            status: QueueStatus::Pending,
            last_error: None,
            next_retry_at: None,
        });
        let store: Arc<dyn EnrichmentStore> = Arc::new(store);
        let worker = make_worker(store.clone());
        let item = store.claim_next_enrichment().await.unwrap().unwrap();
        let result = worker.process_item(CancellationToken::new(), &item).await;
        assert!(matches!(result, Err(EnrichmentError::NoProvidersAvailable)));
    }
}
