//! HTML metadata extraction: `<title>`, meta tags, OpenGraph, and
//! JSON-LD (`NewsArticle`/`Article`/`BlogPosting`), plus a readability
//! style main-text extraction.

use scraper::{Html, Selector};
use serde_json::Value;

#[derive(Debug, Default, Clone)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub image_url: Option<String>,
}

/// Walks a JSON-LD payload (handling `@graph`) and merges in fields
/// from any `NewsArticle`/`Article`/`BlogPosting` node, in document order.
fn merge_json_ld_value(value: &Value, into: &mut PageMetadata) {
    match value {
        Value::Array(items) => {
            for item in items {
                merge_json_ld_value(item, into);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                merge_json_ld_value(graph, into);
                return;
            }
            let type_matches = map
                .get("@type")
                .and_then(|t| t.as_str())
                .map(|t| matches!(t, "NewsArticle" | "Article" | "BlogPosting"))
                .unwrap_or(false);
            if !type_matches {
                return;
            }
            if into.title.is_none() {
                into.title = map.get("headline").and_then(|v| v.as_str()).map(str::to_string);
            }
            if into.description.is_none() {
                into.description = map.get("description").and_then(|v| v.as_str()).map(str::to_string);
            }
            if into.published_at.is_none() {
                into.published_at = map.get("datePublished").and_then(|v| v.as_str()).map(str::to_string);
            }
            if into.author.is_none() {
                into.author = extract_author(map.get("author"));
            }
            if into.image_url.is_none() {
                into.image_url = extract_image(map.get("image"));
            }
        }
        _ => {}
    }
}

fn extract_author(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(|v| v.as_str()).map(str::to_string),
        Value::Array(items) => items.iter().find_map(|v| extract_author(Some(v))),
        _ => None,
    }
}

fn extract_image(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("url").and_then(|v| v.as_str()).map(str::to_string),
        Value::Array(items) => items.first().and_then(|v| extract_image(Some(v))),
        _ => None,
    }
}

fn meta_content(doc: &Html, attr: &str, key: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[{attr}=\"{key}\"]")).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

/// Parses `<title>`, standard/OpenGraph meta tags, and all
/// `application/ld+json` blocks, merging per the precedence in the
/// field-resolution rule: JSON-LD beats OpenGraph beats plain meta
/// beats `<title>`.
pub fn extract_metadata(html: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let mut json_ld = PageMetadata::default();
    if let Ok(script_sel) = Selector::parse(r#"script[type="application/ld+json"]"#) {
        for script in doc.select(&script_sel) {
            let text = script.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                merge_json_ld_value(&value, &mut json_ld);
            }
        }
    }

    let og_title = meta_content(&doc, "property", "og:title");
    let og_description = meta_content(&doc, "property", "og:description");
    let og_image = meta_content(&doc, "property", "og:image");
    let meta_description = meta_content(&doc, "name", "description");
    let meta_author = meta_content(&doc, "name", "author");
    let article_published = meta_content(&doc, "property", "article:published_time");

    let title_tag = Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .map(|el| el.text().collect::<String>())
        .filter(|s| !s.trim().is_empty());

    PageMetadata {
        title: json_ld.title.take().or(og_title).or(title_tag),
        description: json_ld.description.take().or(og_description).or(meta_description),
        author: json_ld.author.take().or(meta_author),
        published_at: json_ld.published_at.take().or(article_published),
        image_url: json_ld.image_url.take().or(og_image),
    }
}

/// Firefox-reader-mode-style body extraction: scores block elements by
/// text density and returns the highest-scoring subtree's text.
pub fn extract_main_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(block_selector) = Selector::parse("article, main, div, section") else {
        return String::new();
    };
    let Ok(noise_selector) = Selector::parse("script, style, nav, header, footer, aside, form") else {
        return String::new();
    };
    let noise_ids: std::collections::HashSet<_> = doc.select(&noise_selector).map(|el| el.id()).collect();

    let mut best_text = String::new();
    let mut best_score = 0.0f64;

    for candidate in doc.select(&block_selector) {
        if candidate.children().any(|c| noise_ids.contains(&c.id())) {
            continue;
        }
        let text: String = candidate
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.len() < 200 {
            continue;
        }
        let paragraph_count = candidate
            .select(&Selector::parse("p").unwrap())
            .count()
            .max(1) as f64;
        let score = text.len() as f64 * paragraph_count.sqrt();
        if score > best_score {
            best_score = score;
            best_text = text;
        }
    }

    if best_text.is_empty() {
        // Fall back to whole-body text when no block scores well.
        if let Ok(body_sel) = Selector::parse("body") {
            if let Some(body) = doc.select(&body_sel).next() {
                best_text = body
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        }
    }
    best_text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_ld_news_article() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">
            {"@type":"NewsArticle","headline":"Headline","description":"Desc","datePublished":"2024-05-01T00:00:00Z","author":{"name":"Jane Doe"}}
            </script>
            </head><body></body></html>
        "#;
        let meta = extract_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Headline"));
        assert_eq!(meta.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn falls_back_through_og_then_title() {
        let html = r#"<html><head><title>Fallback Title</title></head><body></body></html>"#;
        let meta = extract_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Fallback Title"));
    }

    #[test]
    fn extracts_main_text_from_largest_article_block() {
        let html = r#"
            <html><body>
            <nav>Home About Contact</nav>
            <article><p>This is the real article body with plenty of words to make it win the density comparison against navigation links and other short blocks on the page.</p></article>
            </body></html>
        "#;
        let text = extract_main_text(html);
        assert!(text.contains("real article body"));
    }
}
