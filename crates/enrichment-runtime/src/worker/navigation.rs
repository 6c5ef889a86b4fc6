//! Filters out navigation/listing URLs (category, tag, archive,
//! pagination, search, feed, sitemap, language-prefix-only paths) that
//! are not themselves articles.

use once_cell::sync::Lazy;
use regex::Regex;

static NAVIGATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)/category/",
        r"(?i)/categories/",
        r"(?i)/tag/",
        r"(?i)/tags/",
        r"(?i)/archive/?$",
        r"(?i)/archives/",
        r"(?i)[?&]page=\d+",
        r"(?i)/page/\d+/?$",
        r"(?i)/search\??",
        r"(?i)/feed/?$",
        r"(?i)\.rss$",
        r"(?i)/sitemap",
        r"(?i)^/[a-z]{2}/?$",
        r"(?i)/$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// True when the URL's path (and query) match a known navigation
/// pattern rather than an article.
pub fn is_navigation_url(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| format!("{}{}", u.path(), u.query().map(|q| format!("?{q}")).unwrap_or_default()))
        .unwrap_or_else(|_| url.to_string());

    if path == "/" {
        return true;
    }
    NAVIGATION_PATTERNS.iter().any(|re| re.is_match(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_category_and_tag_pages() {
        assert!(is_navigation_url("https://example.com/category/world"));
        assert!(is_navigation_url("https://example.com/tag/politics"));
    }

    #[test]
    fn flags_pagination() {
        assert!(is_navigation_url("https://example.com/news?page=3"));
        assert!(is_navigation_url("https://example.com/news/page/2/"));
    }

    #[test]
    fn flags_homepage_and_language_prefix() {
        assert!(is_navigation_url("https://example.com/"));
        assert!(is_navigation_url("https://example.com/en"));
    }

    #[test]
    fn allows_article_urls() {
        assert!(!is_navigation_url("https://example.com/2024/05/01/apple-reports-earnings"));
    }
}
