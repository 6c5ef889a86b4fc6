//! YaCy provider: `GET {base}/yacysearch.json`, authenticated via HTTP
//! Digest (preferred) with Basic fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::digest::{DigestAuthenticator, DigestChallenge};
use super::ratelimit::DomainLimiters;
use super::{domain_of, parse_date_any, sniff_json_or_error, status_to_error, SearchProvider};
use crate::types::{ProviderError, SearchResult};

pub struct YaCyProvider {
    base_url: String,
    client: reqwest::Client,
    auth: Option<DigestAuthenticator>,
    limiters: Arc<DomainLimiters>,
}

impl YaCyProvider {
    pub fn new(base_url: impl Into<String>, username: Option<String>, password: Option<String>) -> Self {
        let auth = match (username, password) {
            (Some(u), Some(p)) => Some(DigestAuthenticator::new(u, p)),
            _ => None,
        };
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            auth,
            limiters: Arc::new(DomainLimiters::new(1, 2)),
        }
    }

    fn search_url(&self, query: &str, count: usize) -> String {
        format!(
            "{}/yacysearch.json?query={}&count={}&resource=global&urlmaskfilter={}&prefermaskfilter={}",
            self.base_url,
            urlencoding_encode(query),
            count,
            urlencoding_encode(""),
            urlencoding_encode(""),
        )
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Deserialize)]
struct YaCyResponse {
    channels: Vec<YaCyChannel>,
}

#[derive(Deserialize)]
struct YaCyChannel {
    #[serde(default)]
    items: Vec<YaCyItem>,
}

#[derive(Deserialize)]
struct YaCyItem {
    link: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
}

#[async_trait]
impl SearchProvider for YaCyProvider {
    fn name(&self) -> &str {
        "yacy"
    }

    async fn is_available(&self, ctx: CancellationToken) -> bool {
        let probe = self
            .client
            .get(format!("{}/Status.html", self.base_url))
            .timeout(Duration::from_secs(3))
            .send();
        tokio::select! {
            _ = ctx.cancelled() => false,
            res = probe => res.map(|r| r.status().is_success()).unwrap_or(false),
        }
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let domain = domain_of(&self.base_url);
        let global = super::ratelimit::make_limiter(2, 4);
        if !self.limiters.acquire(ctx.clone(), &domain, &global).await {
            return Err(ProviderError::Timeout { provider: "yacy".into() });
        }

        let url = self.search_url(query, max_results);
        let mut request = self.client.get(&url);

        if let Some(auth) = &self.auth {
            // Probe for a 401 challenge, then replay with Digest.
            let probe = request
                .try_clone()
                .ok_or_else(|| ProviderError::Api {
                    provider: "yacy".into(),
                    message: "request body not replayable".into(),
                })?
                .send();
            let probe_resp = tokio::select! {
                _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "yacy".into() }),
                r = probe => r.map_err(|e| ProviderError::Api { provider: "yacy".into(), message: e.to_string() })?,
            };

            if probe_resp.status().as_u16() == 401 {
                let challenge_header = probe_resp
                    .headers()
                    .get("www-authenticate")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if let Some(challenge) = DigestChallenge::parse(&challenge_header) {
                    let cnonce = format!("{:x}", rand::random::<u64>());
                    let header = auth.authorization_header(&challenge, "GET", &url, &cnonce);
                    request = self.client.get(&url).header("Authorization", header);
                } else {
                    request = self.client.get(&url).header("Authorization", auth.basic_header());
                }
            } else {
                return parse_yacy_body(probe_resp).await;
            }
        }

        let send = request.send();
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Timeout { provider: "yacy".into() }),
            r = send => r.map_err(|e| ProviderError::Api { provider: "yacy".into(), message: e.to_string() })?,
        };
        parse_yacy_body(response).await
    }
}

async fn parse_yacy_body(response: reqwest::Response) -> Result<Vec<SearchResult>, ProviderError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Api {
            provider: "yacy".into(),
            message: e.to_string(),
        })?;
    if !status.is_success() {
        return Err(status_to_error("yacy", status.as_u16()));
    }
    sniff_json_or_error("yacy", &bytes)?;

    let parsed: YaCyResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Api {
        provider: "yacy".into(),
        message: e.to_string(),
    })?;

    let mut out = Vec::new();
    for channel in parsed.channels {
        for item in channel.items {
            out.push(SearchResult {
                domain: domain_of(&item.link),
                url: item.link,
                title: item.title,
                description: item.description,
                published_at: parse_date_any(&item.pub_date, &["%a, %d %b %Y %H:%M:%S %z"]),
                language: None,
                score: None,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query() {
        let provider = YaCyProvider::new("http://localhost:8090", None, None);
        let url = provider.search_url("apple inc", 10);
        assert!(url.contains("query=apple+inc"));
        assert!(url.contains("count=10"));
    }
}
