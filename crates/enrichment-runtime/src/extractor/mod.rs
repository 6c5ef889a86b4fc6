//! Content extraction: fetch HTML/feed bytes, run readability +
//! metadata extraction, detect language.

pub mod feed;
pub mod fetch;
pub mod html;
pub mod lang;

use tokio_util::sync::CancellationToken;

use crate::types::ExtractError;
use fetch::WebFetcher;

#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub image_url: Option<String>,
    pub word_count: usize,
    pub language: String,
}

pub struct ContentExtractor {
    fetcher: WebFetcher,
    max_len: usize,
}

impl ContentExtractor {
    pub fn new(max_len: usize) -> Self {
        Self {
            fetcher: WebFetcher::new(),
            max_len,
        }
    }

    pub async fn extract(&self, ctx: CancellationToken, url: &str) -> Result<ExtractedContent, ExtractError> {
        let body = self.fetcher.fetch(ctx, url).await?;
        let text = String::from_utf8_lossy(&body.bytes).to_string();

        if let Some(item) = feed::parse_first_item(&body.bytes) {
            let content = feed::strip_html_tags(&item.description);
            return Ok(self.finish(item.title, String::new(), content, String::new(), None, None));
        }

        let metadata = html::extract_metadata(&text);
        let main_text = html::extract_main_text(&text);
        if main_text.trim().is_empty() && metadata.title.is_none() {
            return Err(ExtractError::NoContent);
        }

        let published_at = metadata
            .published_at
            .as_deref()
            .and_then(parse_flexible_date);

        Ok(self.finish(
            metadata.title.unwrap_or_default(),
            metadata.description.unwrap_or_default(),
            main_text,
            metadata.author.unwrap_or_default(),
            published_at,
            metadata.image_url,
        ))
    }

    fn finish(
        &self,
        title: String,
        description: String,
        content: String,
        author: String,
        published_at: Option<chrono::DateTime<chrono::Utc>>,
        image_url: Option<String>,
    ) -> ExtractedContent {
        let word_count = content.split_whitespace().count();
        let truncated = truncate_chars(&content, self.max_len);
        let language = lang::detect_language(&format!("{title} {truncated}")).unwrap_or_default();
        ExtractedContent {
            title,
            description,
            content: truncated,
            author,
            published_at,
            image_url,
            word_count,
            language,
        }
    }
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_len).collect();
    format!("{truncated}...")
}

fn parse_flexible_date(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    crate::providers::parse_date_any(
        raw,
        &[
            "%Y-%m-%dT%H:%M:%S%.f%:z",
            "%Y-%m-%dT%H:%M:%SZ",
            "%Y-%m-%d %H:%M:%S",
            "%a, %d %b %Y %H:%M:%S %z",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_appends_ellipsis() {
        let text = "a".repeat(10);
        assert_eq!(truncate_chars(&text, 5), "aaaaa...");
        assert_eq!(truncate_chars(&text, 20), text);
    }
}
