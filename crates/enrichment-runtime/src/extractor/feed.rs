//! Minimal RSS/Atom sniffing: if the body parses as a feed with at
//! least one item, the content extractor short-circuits on its first
//! entry instead of running readability.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: Option<String>,
}

const ITEM_TAGS: &[&str] = &["item", "entry"];
const TITLE_TAGS: &[&str] = &["title"];
const LINK_TAGS: &[&str] = &["link"];
const DESCRIPTION_TAGS: &[&str] = &["description", "summary", "content"];
const DATE_TAGS: &[&str] = &["pubDate", "published", "updated"];

/// Returns the first entry of the feed, or `None` when the body is not
/// recognizable as RSS/Atom.
pub fn parse_first_item(bytes: &[u8]) -> Option<FeedItem> {
    let text = std::str::from_utf8(bytes).ok()?;
    if !looks_like_feed(text) {
        return None;
    }

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut in_item = false;
    let mut current_tag: Option<String> = None;
    let mut item = FeedItem::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if ITEM_TAGS.contains(&name.as_str()) {
                    if in_item {
                        break; // second item started; stop, we only want the first
                    }
                    in_item = true;
                } else if in_item {
                    if name == "link" {
                        if let Some(href) = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"href")
                        {
                            item.link = String::from_utf8_lossy(&href.value).to_string();
                        }
                    }
                    current_tag = Some(name);
                }
            }
            Ok(Event::Text(e)) if in_item => {
                if let Some(tag) = current_tag.as_deref() {
                    let text = e.unescape().unwrap_or_default().to_string();
                    if TITLE_TAGS.contains(&tag) && item.title.is_empty() {
                        item.title = text;
                    } else if LINK_TAGS.contains(&tag) && item.link.is_empty() {
                        item.link = text;
                    } else if DESCRIPTION_TAGS.contains(&tag) && item.description.is_empty() {
                        item.description = text;
                    } else if DATE_TAGS.contains(&tag) && item.published_at.is_none() {
                        item.published_at = Some(text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                if ITEM_TAGS.contains(&name.as_str()) && in_item {
                    return Some(item);
                }
                current_tag = None;
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    if in_item && !item.title.is_empty() {
        Some(item)
    } else {
        None
    }
}

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

fn looks_like_feed(text: &str) -> bool {
    let boundary = text.char_indices().map(|(i, _)| i).find(|&i| i >= 2048).unwrap_or(text.len());
    let head = &text[..boundary];
    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:RDF")
}

/// Strips HTML tags from feed content (most feeds embed escaped HTML).
pub fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_rss_item() {
        let xml = r#"<?xml version="1.0"?>
        <rss><channel>
        <item><title>First</title><link>https://example.com/1</link><description>Body one</description><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
        <item><title>Second</title><link>https://example.com/2</link></item>
        </channel></rss>"#;
        let item = parse_first_item(xml.as_bytes()).expect("feed item");
        assert_eq!(item.title, "First");
        assert_eq!(item.link, "https://example.com/1");
    }

    #[test]
    fn non_feed_returns_none() {
        assert!(parse_first_item(b"<html><body>hi</body></html>").is_none());
    }

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(strip_html_tags("<p>Hello <b>world</b></p>"), "Hello world");
    }
}
