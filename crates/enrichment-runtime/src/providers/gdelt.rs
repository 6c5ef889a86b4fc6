//! GDELT provider: `GET https://api.gdeltproject.org/api/v2/doc/doc`.

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

const BASE_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

pub struct GdeltProvider {
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl GdeltProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            limiter: Arc::new(RateLimiter::direct(
                Quota::per_second(std::num::NonZeroU32::new(1).unwrap())
                    .allow_burst(std::num::NonZeroU32::new(2).unwrap()),
            )),
        }
    }
}

impl Default for GdeltProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct GdeltResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

#[derive(Deserialize)]
struct GdeltArticle {
    url: String,
    title: String,
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    language: Option<String>,
}

#[async_trait]
impl SearchProvider for GdeltProvider {
    fn name(&self) -> &str {
        "gdelt"
    }

    async fn is_available(&self, _ctx: CancellationToken) -> bool {
        true
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if !cancellable_until_ready(ctx.clone(), &self.limiter).await {
            return Err(ProviderError::Timeout { provider: "gdelt".into() });
        }
        let send = self
            .client
            .get(BASE_URL)
            .query(&[
                ("query", query),
                ("mode", "ArtList"),
                ("maxrecords", &max_results.to_string()),
                ("format", "json"),
                ("sort", "DateDesc"),
            ])
            .send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "gdelt".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "gdelt".into(), message: e.to_string() })?,
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Api {
            provider: "gdelt".into(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_to_error("gdelt", status.as_u16()));
        }
        sniff_json_or_error("gdelt", &bytes)?;

        let parsed: GdeltResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
            provider: "gdelt".into(),
            message: e.to_string(),
        })?;

        Ok(parsed
            .articles
            .into_iter()
            .map(|a| SearchResult {
                domain: domain_of(&a.url),
                published_at: parse_date_any(&a.seendate, &["%Y%m%dT%H%M%SZ"]),
                language: a.language,
                title: a.title,
                description: String::new(),
                url: a.url,
                score: None,
            })
            .collect())
    }
}
