//! OpenSearch provider: `POST {base}/{index}/_search` with a `multi_match`
//! query over `title^2,content,description`, sorted by `published_at:desc`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{domain_of, sniff_json_or_error, status_to_error, SearchProvider};
use crate::types::{ProviderError, SearchResult};

pub struct OpenSearchProvider {
    base_url: String,
    index: String,
    client: reqwest::Client,
}

impl OpenSearchProvider {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            index: index.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
        }
    }

    fn search_endpoint(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

#[derive(Deserialize)]
struct OsResponse {
    hits: OsHits,
}

#[derive(Deserialize)]
struct OsHits {
    #[serde(default)]
    hits: Vec<OsHit>,
}

#[derive(Deserialize)]
struct OsHit {
    #[serde(rename = "_source")]
    source: OsSource,
}

#[derive(Deserialize)]
struct OsSource {
    url: String,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[async_trait]
impl SearchProvider for OpenSearchProvider {
    fn name(&self) -> &str {
        "opensearch"
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
        let body = serde_json::json!({
            "size": max_results,
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title^2", "content", "description"],
                }
            },
            "sort": [{ "published_at": { "order": "desc" } }],
        });

        let send = self.client.post(self.search_endpoint()).json(&body).send();
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "opensearch".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "opensearch".into(), message: e.to_string() })?,
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Api {
            provider: "opensearch".into(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_to_error("opensearch", status.as_u16()));
        }
        sniff_json_or_error("opensearch", &bytes)?;

        let parsed: OsResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
            provider: "opensearch".into(),
            message: e.to_string(),
        })?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|h| {
                let source = h.source;
                SearchResult {
                    domain: domain_of(&source.url),
                    published_at: source
                        .published_at
                        .as_deref()
                        .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                        .map(|d| d.with_timezone(&chrono::Utc)),
                    title: source.title,
                    description: source.description.unwrap_or(source.content),
                    url: source.url,
                    language: None,
                    score: None,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_endpoint_includes_index() {
        let provider = OpenSearchProvider::new("http://localhost:9200", "articles");
        assert_eq!(provider.search_endpoint(), "http://localhost:9200/articles/_search");
    }
}
