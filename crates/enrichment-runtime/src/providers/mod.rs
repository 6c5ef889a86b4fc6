//! Provider registry and the uniform `SearchProvider` contract.

pub mod digest;
pub mod eventregistry;
pub mod gdelt;
pub mod newsapi;
pub mod opensearch;
pub mod ratelimit;
pub mod searxng;
pub mod solr;
pub mod yacy;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::breaker::{BreakerTable, CircuitBreakerConfig};
use crate::types::{EnrichmentError, ProviderError, SearchResult};

/// Core capability every provider exposes. `search_with_language` is an
/// optional capability: the default implementation returns `None`,
/// signalling the registry to fall back to `search` and ignore language.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Bounded by a short probe timeout; must respect `ctx` cancellation.
    async fn is_available(&self, ctx: CancellationToken) -> bool;

    async fn search(
        &self,
        ctx: CancellationToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    async fn search_with_language(
        &self,
        ctx: CancellationToken,
        query: &str,
        lang: &str,
        max_results: usize,
    ) -> Option<Result<Vec<SearchResult>, ProviderError>> {
        let _ = (ctx, query, lang, max_results);
        None
    }

    /// Diagnostic/metrics label only — the registry never sorts by this.
    fn priority(&self) -> u8 {
        0
    }
}

/// Insertion-ordered list of providers plus a breaker per provider.
pub struct Registry {
    providers: RwLock<Vec<Arc<dyn SearchProvider>>>,
    breakers: BreakerTable,
}

impl Registry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            breakers: BreakerTable::new(breaker_config),
        }
    }

    pub fn register(&self, provider: Arc<dyn SearchProvider>) {
        self.breakers.register(provider.name());
        self.providers.write().push(provider);
    }

    /// Readers take a read lock and copy the slice before releasing it,
    /// per the stated concurrency model.
    fn ordered_providers(&self) -> Vec<Arc<dyn SearchProvider>> {
        self.providers.read().clone()
    }

    pub async fn available_providers(&self, ctx: CancellationToken) -> Vec<Arc<dyn SearchProvider>> {
        let mut out = Vec::new();
        for provider in self.ordered_providers() {
            if !self.breakers.can_attempt(provider.name()) {
                continue;
            }
            if provider.is_available(ctx.clone()).await {
                out.push(provider);
            }
        }
        out
    }

    /// Iterates providers in registry order. On error, records a breaker
    /// failure and continues to the next provider; on success, records a
    /// breaker success and returns immediately.
    #[instrument(skip(self, ctx))]
    pub async fn search_with_fallback(
        &self,
        ctx: CancellationToken,
        query: &str,
        language: Option<&str>,
        max_results: usize,
    ) -> Result<(Vec<SearchResult>, String), EnrichmentError> {
        let mut last_err: Option<ProviderError> = None;

        for provider in self.ordered_providers() {
            if ctx.is_cancelled() {
                return Err(EnrichmentError::Cancelled);
            }
            if !self.breakers.can_attempt(provider.name()) {
                continue;
            }
            if !provider.is_available(ctx.clone()).await {
                continue;
            }

            let result = match language {
                Some(lang) => match provider
                    .search_with_language(ctx.clone(), query, lang, max_results)
                    .await
                {
                    Some(r) => r,
                    None => provider.search(ctx.clone(), query, max_results).await,
                },
                None => provider.search(ctx.clone(), query, max_results).await,
            };

            match result {
                Ok(results) => {
                    self.breakers.record_success(provider.name());
                    return Ok((results, provider.name().to_string()));
                }
                Err(err) => {
                    self.breakers.record_failure(provider.name());
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => Err(EnrichmentError::Provider(err)),
            None => Err(EnrichmentError::NoProvidersAvailable),
        }
    }
}

/// Builds a registry from the configured provider order, reading each
/// provider's own connection details from the environment. Unknown
/// names are rejected by `WorkerConfig::validate` before this runs, so
/// every name here is expected to match one of the `match` arms.
pub fn build_registry_from_env(order: &[String], breaker_config: CircuitBreakerConfig) -> Registry {
    let registry = Registry::new(breaker_config);
    for name in order {
        let provider: Option<Arc<dyn SearchProvider>> = match name.as_str() {
            "yacy" => std::env::var("YACY_BASE_URL").ok().map(|base| {
                let username = std::env::var("YACY_USERNAME").ok();
                let password = std::env::var("YACY_PASSWORD").ok();
                Arc::new(yacy::YaCyProvider::new(base, username, password)) as Arc<dyn SearchProvider>
            }),
            "gdelt" => Some(Arc::new(gdelt::GdeltProvider::new()) as Arc<dyn SearchProvider>),
            "newsapi" => {
                let api_key = std::env::var("NEWSAPI_API_KEY").ok();
                Some(Arc::new(newsapi::NewsApiProvider::new(api_key)) as Arc<dyn SearchProvider>)
            }
            "eventregistry" => {
                let api_key = std::env::var("EVENTREGISTRY_API_KEY").ok();
                Some(Arc::new(eventregistry::EventRegistryProvider::new(api_key)) as Arc<dyn SearchProvider>)
            }
            "searxng" => std::env::var("SEARXNG_BASE_URL").ok().map(|base| {
                let engines = std::env::var("SEARXNG_ENGINES").ok();
                Arc::new(searxng::SearxngProvider::new(base, engines)) as Arc<dyn SearchProvider>
            }),
            "opensearch" => std::env::var("OPENSEARCH_BASE_URL").ok().map(|base| {
                let index = std::env::var("OPENSEARCH_INDEX").unwrap_or_else(|_| "articles".to_string());
                Arc::new(opensearch::OpenSearchProvider::new(base, index)) as Arc<dyn SearchProvider>
            }),
            "solr" => std::env::var("SOLR_BASE_URL").ok().map(|base| {
                let core = std::env::var("SOLR_CORE").unwrap_or_else(|_| "articles".to_string());
                Arc::new(solr::SolrProvider::new(base, core)) as Arc<dyn SearchProvider>
            }),
            _ => None,
        };
        if let Some(provider) = provider {
            registry.register(provider);
        }
    }
    registry
}

/// Estimated USD cost of a single request against a billable provider,
/// per spec §4.8 ("estimated USD cost per request for billable
/// providers"). Self-hosted providers (YaCy, SearxNG, OpenSearch, Solr)
/// and GDELT's free tier cost nothing; metered providers carry a rough
/// per-call estimate for budget tracking.
pub fn provider_cost_estimate(provider: &str) -> f64 {
    match provider {
        "newsapi" => 0.0008,
        "eventregistry" => 0.0012,
        _ => 0.0,
    }
}

/// Extracts the lowercased host from a URL, used for result normalization.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Response bytes that do not begin with `{` or `[` are API-error
/// envelopes rather than parseable JSON: the first 200 bytes (with
/// ellipsis) are wrapped in the provider-specific error.
pub fn sniff_json_or_error(provider: &str, body: &[u8]) -> Result<(), ProviderError> {
    let first_non_ws = body.iter().find(|b| !b.is_ascii_whitespace());
    match first_non_ws {
        Some(b'{') | Some(b'[') => Ok(()),
        _ => {
            let head = String::from_utf8_lossy(&body[..body.len().min(200)]);
            let suffix = if body.len() > 200 { "..." } else { "" };
            Err(ProviderError::Api {
                provider: provider.to_string(),
                message: format!("{head}{suffix}"),
            })
        }
    }
}

pub fn status_to_error(provider: &str, status: u16) -> ProviderError {
    if status == 429 {
        ProviderError::RateLimited {
            provider: provider.to_string(),
        }
    } else {
        ProviderError::UnexpectedStatus {
            provider: provider.to_string(),
            status,
        }
    }
}

/// Parses a date against a fixed list of formats, returning `None`
/// (rather than a zero timestamp) when nothing matches — callers treat
/// `None` as "leave `published_at` unset".
pub fn parse_date_any(raw: &str, formats: &[&str]) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    for fmt in formats {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_any_tries_rfc3339_then_formats() {
        assert!(parse_date_any("2024-07-01T10:00:00Z", &[]).is_some());
        assert!(parse_date_any("20240701T100000Z", &["%Y%m%dT%H%M%SZ"]).is_some());
        assert!(parse_date_any("garbage", &["%Y%m%dT%H%M%SZ"]).is_none());
    }

    #[test]
    fn sniff_accepts_object_and_array() {
        assert!(sniff_json_or_error("p", b"{\"a\":1}").is_ok());
        assert!(sniff_json_or_error("p", b"  [1,2]").is_ok());
    }

    #[test]
    fn sniff_rejects_html_error_page() {
        let err = sniff_json_or_error("p", b"<html>Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[test]
    fn status_maps_429_to_rate_limited() {
        assert!(matches!(
            status_to_error("p", 429),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            status_to_error("p", 503),
            ProviderError::UnexpectedStatus { status: 503, .. }
        ));
    }

    #[test]
    fn domain_of_lowercases_host() {
        assert_eq!(domain_of("https://EXAMPLE.com/a?b=1"), "example.com");
    }
}
