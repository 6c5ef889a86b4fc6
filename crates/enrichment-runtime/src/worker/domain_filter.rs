//! Domain allow/deny filtering, hot-reloaded from persistent settings.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{DomainFilterConfig, DomainFilterMode};
use crate::store::EnrichmentStore;

/// Built-in social-media domains rejected unless the filter is
/// explicitly configured to allow them.
const SOCIAL_MEDIA_DOMAINS: &[&str] = &[
    "twitter.com", "x.com", "facebook.com", "youtube.com", "tiktok.com", "linkedin.com",
    "t.me", "telegram.org", "reddit.com", "bit.ly", "tinyurl.com", "t.co", "goo.gl",
];

#[derive(Debug, Clone)]
pub struct DomainFilter {
    mode: DomainFilterMode,
    allow: HashSet<String>,
    deny: HashSet<String>,
    skip_social: bool,
    social_media_set: HashSet<String>,
}

impl DomainFilter {
    pub fn from_config(config: &DomainFilterConfig) -> Self {
        Self {
            mode: config.mode,
            allow: config.allow.clone(),
            deny: config.deny.clone(),
            skip_social: config.skip_social,
            social_media_set: SOCIAL_MEDIA_DOMAINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn allows(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        if self.skip_social && self.social_media_set.contains(&domain) {
            return false;
        }
        match self.mode {
            DomainFilterMode::AllowAll => !self.deny.contains(&domain),
            DomainFilterMode::Allowlist => self.allow.contains(&domain),
            DomainFilterMode::Denylist => !self.deny.contains(&domain),
        }
    }
}

/// Hot-swappable holder: the worker replaces the whole filter under a
/// write lock on reload, readers take a cheap read lock and clone.
pub struct DomainFilterHolder {
    current: RwLock<Arc<DomainFilter>>,
}

impl DomainFilterHolder {
    pub fn new(initial: DomainFilter) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn current(&self) -> Arc<DomainFilter> {
        self.current.read().clone()
    }

    pub fn swap(&self, next: DomainFilter) {
        *self.current.write() = Arc::new(next);
    }

    /// Rebuilds from storage settings, falling back to `fallback`
    /// (the static config) if settings are absent or unparseable.
    pub async fn reload_from_store(&self, store: &dyn EnrichmentStore, fallback: &DomainFilterConfig) {
        let mut config = fallback.clone();
        if let Ok(Some(raw)) = store.get_setting("enrichment.domain_filter").await {
            if let Ok(parsed) = serde_json::from_str::<DomainFilterConfig>(&raw) {
                config = parsed;
            }
        }
        self.swap(DomainFilter::from_config(&config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_rejects_social_media_by_default() {
        let filter = DomainFilter::from_config(&DomainFilterConfig::default());
        assert!(!filter.allows("twitter.com"));
        assert!(filter.allows("reuters.com"));
    }

    #[test]
    fn allowlist_mode_only_admits_listed_domains() {
        let config = DomainFilterConfig {
            mode: DomainFilterMode::Allowlist,
            allow: ["reuters.com".to_string()].into_iter().collect(),
            deny: HashSet::new(),
            skip_social: true,
        };
        let filter = DomainFilter::from_config(&config);
        assert!(filter.allows("reuters.com"));
        assert!(!filter.allows("apnews.com"));
    }

    #[test]
    fn denylist_mode_blocks_only_listed_domains() {
        let config = DomainFilterConfig {
            mode: DomainFilterMode::Denylist,
            allow: HashSet::new(),
            deny: ["badsite.com".to_string()].into_iter().collect(),
            skip_social: false,
        };
        let filter = DomainFilter::from_config(&config);
        assert!(!filter.allows("badsite.com"));
        assert!(filter.allows("reuters.com"));
    }
}
