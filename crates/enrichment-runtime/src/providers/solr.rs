//! Solr provider: `GET {base}/solr/{core}/select?q=...&wt=json`.
//!
//! The wire contract was left open in the distilled spec; Solr's own
//! select handler with `wt=json` is the conventional choice and is what
//! every Solr client library defaults to.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{domain_of, sniff_json_or_error, status_to_error, SearchProvider};
use crate::types::{ProviderError, SearchResult};

pub struct SolrProvider {
    base_url: String,
    core: String,
    client: reqwest::Client,
}

impl SolrProvider {
    pub fn new(base_url: impl Into<String>, core: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            core: core.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
        }
    }

    fn select_url(&self) -> String {
        format!("{}/solr/{}/select", self.base_url, self.core)
    }
}

#[derive(Deserialize)]
struct SolrResponse {
    response: SolrResponseBody,
}

#[derive(Deserialize)]
struct SolrResponseBody {
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Deserialize)]
struct SolrDoc {
    url: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[async_trait]
impl SearchProvider for SolrProvider {
    fn name(&self) -> &str {
        "solr"
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
        let send = self
            .client
            .get(self.select_url())
            .query(&[
                ("q", query),
                ("wt", "json"),
                ("rows", &max_results.to_string()),
                ("sort", "published_at desc"),
            ])
            .send();

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "solr".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "solr".into(), message: e.to_string() })?,
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ProviderError::Api {
            provider: "solr".into(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_to_error("solr", status.as_u16()));
        }
        sniff_json_or_error("solr", &bytes)?;

        let parsed: SolrResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
            provider: "solr".into(),
            message: e.to_string(),
        })?;

        Ok(parsed
            .response
            .docs
            .into_iter()
            .map(|d| SearchResult {
                domain: domain_of(&d.url),
                published_at: d
                    .published_at
                    .as_deref()
                    .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
                    .map(|v| v.with_timezone(&chrono::Utc)),
                title: d.title,
                description: d.content.unwrap_or_default(),
                url: d.url,
                language: None,
                score: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_url_includes_core() {
        let provider = SolrProvider::new("http://localhost:8983", "news");
        assert_eq!(provider.select_url(), "http://localhost:8983/solr/news/select");
    }
}
