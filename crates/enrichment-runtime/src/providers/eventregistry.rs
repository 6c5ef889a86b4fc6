//! Event Registry provider: `POST /api/v1/article/getArticles` with
//! `apiKey` in the query string.

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

const BASE_URL: &str = "https://eventregistry.org/api/v1/article/getArticles";

pub struct EventRegistryProvider {
    api_key: Option<String>,
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl EventRegistryProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(
                std::num::NonZeroU32::new(30).unwrap(),
            ))),
        }
    }
}

#[derive(Deserialize)]
struct ErResponse {
    #[serde(default)]
    articles: ErArticles,
}

#[derive(Deserialize, Default)]
struct ErArticles {
    #[serde(default)]
    results: Vec<ErArticle>,
}

#[derive(Deserialize)]
struct ErArticle {
    url: String,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
}

#[async_trait]
impl SearchProvider for EventRegistryProvider {
    fn name(&self) -> &str {
        "eventregistry"
    }

    async fn is_available(&self, _ctx: CancellationToken) -> bool {
        self.api_key.is_some()
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let api_key = self.api_key.clone().ok_or_else(|| ProviderError::NotConfigured {
            provider: "eventregistry".into(),
        })?;
        if !cancellable_until_ready(ctx.clone(), &self.limiter).await {
            return Err(ProviderError::Timeout { provider: "eventregistry".into() });
        }

        let body = serde_json::json!({
            "action": "getArticles",
            "keyword": query,
            "articlesCount": max_results,
            "apiKey": api_key,
        });

        let send = self
            .client
            .post(BASE_URL)
            .query(&[("apiKey", api_key.as_str())])
            .json(&body)
            .send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "eventregistry".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "eventregistry".into(), message: e.to_string() })?,
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Api {
            provider: "eventregistry".into(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_to_error("eventregistry", status.as_u16()));
        }
        sniff_json_or_error("eventregistry", &bytes)?;

        let parsed: ErResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
            provider: "eventregistry".into(),
            message: e.to_string(),
        })?;

        Ok(parsed
            .articles
            .results
            .into_iter()
            .map(|a| {
                let stamp = format!("{}T{}Z", a.date, a.time);
                SearchResult {
                    domain: domain_of(&a.url),
                    published_at: parse_date_any(&stamp, &["%Y-%m-%dT%H:%M:%SZ"]),
                    description: a.body.chars().take(300).collect(),
                    title: a.title,
                    url: a.url,
                    language: None,
                    score: None,
                }
            })
            .collect())
    }
}
