//! NewsAPI provider: `GET https://newsapi.org/v2/everything`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::ratelimit::cancellable_until_ready;
use super::{domain_of, sniff_json_or_error, status_to_error, SearchProvider};
use crate::types::{ProviderError, SearchResult};

const BASE_URL: &str = "https://newsapi.org/v2/everything";

pub struct NewsApiProvider {
    api_key: Option<String>,
    client: reqwest::Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl NewsApiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            limiter: Arc::new(RateLimiter::direct(
                Quota::per_minute(std::num::NonZeroU32::new(60).unwrap()),
            )),
        }
    }
}

#[derive(Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Deserialize)]
struct NewsApiArticle {
    url: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: String,
}

#[async_trait]
impl SearchProvider for NewsApiProvider {
    fn name(&self) -> &str {
        "newsapi"
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
        self.search_with_language(ctx, query, "", max_results)
            .await
            .unwrap_or_else(|| {
                Err(ProviderError::NotConfigured {
                    provider: "newsapi".into(),
                })
            })
    }

    async fn search_with_language(
        &self,
        ctx: CancellationToken,
        query: &str,
        lang: &str,
        max_results: usize,
    ) -> Option<Result<Vec<SearchResult>, ProviderError>> {
        let api_key = self.api_key.clone()?;
        if !cancellable_until_ready(ctx.clone(), &self.limiter).await {
            return Some(Err(ProviderError::Timeout { provider: "newsapi".into() }));
        }

        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("pageSize".to_string(), max_results.to_string()),
            ("sortBy".to_string(), "publishedAt".to_string()),
        ];
        if !lang.is_empty() {
            params.push(("language".to_string(), lang.to_string()));
        }

        let send = self
            .client
            .get(BASE_URL)
            .query(&params)
            .header("X-Api-Key", api_key)
            .send();

        let response = match tokio::select! {
            _ = ctx.cancelled() => return Some(Err(ProviderError::Timeout { provider: "newsapi".into() })),
            r = send => r,
        } {
            Ok(r) => r,
            Err(e) => {
                return Some(Err(ProviderError::Api {
                    provider: "newsapi".into(),
                    message: e.to_string(),
                }))
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return Some(Err(ProviderError::Api {
                    provider: "newsapi".into(),
                    message: e.to_string(),
                }))
            }
        };
        if !status.is_success() {
            return Some(Err(status_to_error("newsapi", status.as_u16())));
        }
        if let Err(e) = sniff_json_or_error("newsapi", &bytes) {
            return Some(Err(e));
        }

        let parsed: NewsApiResponse = match serde_json::from_slice(&bytes) {
            Ok(p) => p,
            Err(e) => {
                return Some(Err(ProviderError::Api {
                    provider: "newsapi".into(),
                    message: e.to_string(),
                }))
            }
        };

        Some(Ok(parsed
            .articles
            .into_iter()
            .map(|a| SearchResult {
                domain: domain_of(&a.url),
                published_at: chrono::DateTime::parse_from_rfc3339(&a.published_at)
                    .ok()
                    .map(|d| d.with_timezone(&chrono::Utc)),
                language: if lang.is_empty() { None } else { Some(lang.to_string()) },
                title: a.title,
                description: a.description.unwrap_or_default(),
                url: a.url,
                score: None,
            })
            .collect()))
    }
}
