//! SearxNG provider: `GET {base}/search?q&format=json&categories=general`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::ratelimit::cancellable_until_ready;
use super::{domain_of, parse_date_any, sniff_json_or_error, status_to_error, SearchProvider};
use crate::types::{ProviderError, SearchResult};

/// Date formats SearxNG instances have been observed to emit.
const DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

pub struct SearxngProvider {
    base_url: String,
    engines: Option<String>,
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SearxngProvider {
    pub fn new(base_url: impl Into<String>, engines: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            engines,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                std::num::NonZeroU32::new(2).unwrap(),
            ))),
        }
    }
}

#[derive(Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Deserialize)]
struct SearxngResult {
    url: String,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &str {
        "searxng"
    }

    async fn is_available(&self, _ctx: CancellationToken) -> bool {
        !self.base_url.is_empty()
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if !cancellable_until_ready(ctx.clone(), &self.limiter).await {
            return Err(ProviderError::Timeout { provider: "searxng".into() });
        }

        let mut request = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("categories", "general"),
            ]);
        if let Some(engines) = &self.engines {
            request = request.query(&[("engines", engines.as_str())]);
        }

        let send = request.send();
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "searxng".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "searxng".into(), message: e.to_string() })?,
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Api {
            provider: "searxng".into(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_to_error("searxng", status.as_u16()));
        }
        sniff_json_or_error("searxng", &bytes)?;

        let parsed: SearxngResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
            provider: "searxng".into(),
            message: e.to_string(),
        })?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                domain: domain_of(&r.url),
                published_at: r
                    .published_date
                    .as_deref()
                    .and_then(|d| parse_date_any(d, DATE_FORMATS)),
                title: r.title,
                description: r.content,
                url: r.url,
                language: None,
                score: None,
            })
            .collect())
    }
}
