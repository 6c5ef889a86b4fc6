//! Per-domain rate-limited HTTP fetcher: redirect cap, 5 MB body cap,
//! content-type sniffing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::providers::ratelimit::{make_limiter, DomainLimiters};
use crate::types::ExtractError;

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const USER_AGENT: &str = "EnrichmentWorker/1.0 (+evidence-fetcher)";

pub struct WebFetcher {
    client: reqwest::Client,
    domain_limiters: Arc<DomainLimiters>,
    global: Arc<governor::RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>,
}

pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub final_url: String,
}

impl WebFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::limited(5))
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(20))
                .build()
                .expect("reqwest client"),
            domain_limiters: Arc::new(DomainLimiters::new(1, 2)),
            global: make_limiter(5, 10),
        }
    }

    pub async fn fetch(&self, ctx: CancellationToken, url: &str) -> Result<FetchedBody, ExtractError> {
        let domain = crate::providers::domain_of(url);
        if !self.domain_limiters.acquire(ctx.clone(), &domain, &self.global).await {
            return Err(ExtractError::Cancelled);
        }

        let send = self.client.get(url).send();
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ExtractError::Cancelled),
            r = send => r.map_err(|e| ExtractError::FetchFailed(e.to_string()))?,
        };

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let recv = response.bytes();
        let bytes = tokio::select! {
            _ = ctx.cancelled() => return Err(ExtractError::Cancelled),
            b = recv => b.map_err(|e| ExtractError::FetchFailed(e.to_string()))?,
        };

        let capped: Vec<u8> = bytes.into_iter().take(MAX_BODY_BYTES).collect();

        if !is_textual(&content_type, &capped) {
            return Err(ExtractError::NonTextualBody);
        }

        Ok(FetchedBody {
            bytes: capped,
            content_type,
            final_url,
        })
    }
}

impl Default for WebFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects PDFs, octet-streams, and anything whose first bytes don't
/// look like text once the declared content-type is ambiguous.
fn is_textual(content_type: &str, body: &[u8]) -> bool {
    let lower = content_type.to_lowercase();
    if lower.contains("pdf") || lower.contains("octet-stream") || lower.contains("image/")
        || lower.contains("video/") || lower.contains("audio/")
    {
        return false;
    }
    if body.starts_with(b"%PDF") {
        return false;
    }
    if lower.contains("html") || lower.contains("xml") || lower.contains("text") || lower.contains("json") {
        return true;
    }
    // No declared type: sniff for a majority of printable/whitespace bytes.
    let sample = &body[..body.len().min(512)];
    if sample.is_empty() {
        return true;
    }
    let printable = sample
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    printable as f64 / sample.len() as f64 >= 0.85
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pdf_content_type() {
        assert!(!is_textual("application/pdf", b"hello"));
    }

    #[test]
    fn rejects_pdf_magic_bytes_with_unknown_type() {
        assert!(!is_textual("", b"%PDF-1.4 ..."));
    }

    #[test]
    fn accepts_html() {
        assert!(is_textual("text/html; charset=utf-8", b"<html></html>"));
    }

    #[test]
    fn accepts_unlabeled_plain_text() {
        assert!(is_textual("", b"hello world, this is a normal sentence."));
    }
}
