//! Worker configuration: env-driven with typed validation, mirroring the
//! `Config::from_env` / `Config::validate` split used elsewhere in this
//! codebase. Unknown env keys are ignored.

use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub providers: ProviderConfig,
    pub budget: BudgetConfig,
    pub max_results_per_query: usize,
    pub max_evidence_per_item: usize,
    pub min_agreement: f64,
    pub dedup_similarity: f64,
    pub item_timeout: Duration,
    pub cache_ttl: Duration,
    pub poll_interval: Duration,
    pub budget_check_interval: Duration,
    pub domain_filter_reload_interval: Duration,
    pub cleanup_interval: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub domains: DomainFilterConfig,
    pub query_translate: bool,
    pub link_enrichment: LinkEnrichmentConfig,
    pub language_routing: LanguageRoutingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Comma-separated, case-insensitive, duplicates dropped, unknown
    /// names ignored.
    pub order: Vec<String>,
    pub cooldown: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            order: ["yacy", "gdelt", "eventregistry", "newsapi", "searxng", "opensearch"]
                .into_iter()
                .map(String::from)
                .collect(),
            cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl ProviderConfig {
    pub fn parse_order(csv: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for raw in csv.split(',') {
            let name = raw.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.clone()) {
                out.push(name);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub daily_limit: u64,
    pub monthly_limit: u64,
    pub daily_cap_usd: f64,
    pub monthly_cap_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10_000,
            monthly_limit: 200_000,
            daily_cap_usd: 50.0,
            monthly_cap_usd: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainFilterMode {
    AllowAll,
    Allowlist,
    Denylist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainFilterConfig {
    pub mode: DomainFilterMode,
    pub allow: HashSet<String>,
    pub deny: HashSet<String>,
    pub skip_social: bool,
}

impl Default for DomainFilterConfig {
    fn default() -> Self {
        Self {
            mode: DomainFilterMode::AllowAll,
            allow: HashSet::new(),
            deny: HashSet::new(),
            skip_social: true,
        }
    }
}

/// One rule of the context tier: if any `keywords` entry appears in the
/// item's summary, `languages` wins (spec.md §3, priority channel >
/// context > topic > default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageContextRule {
    pub name: String,
    pub languages: Vec<String>,
    pub keywords: Vec<String>,
}

/// `{default, channel, context, topic}` target-language routing table.
/// Resolution priority: channel > context > topic > default. Channel
/// and topic maps start empty (populated from persistent settings the
/// same way `DomainFilterConfig` is hot-reloaded); an empty policy just
/// resolves to `default` for every item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageRoutingPolicy {
    pub default: Vec<String>,
    pub channel: HashMap<String, Vec<String>>,
    pub context: Vec<LanguageContextRule>,
    pub topic: HashMap<String, Vec<String>>,
}

impl Default for LanguageRoutingPolicy {
    fn default() -> Self {
        Self {
            default: vec!["en".to_string(), "ru".to_string()],
            channel: HashMap::new(),
            context: Vec::new(),
            topic: HashMap::new(),
        }
    }
}

impl LanguageRoutingPolicy {
    /// Resolves the target languages for one item: channel override,
    /// else the first context rule whose keyword appears in `summary`,
    /// else the topic override, else `default`.
    pub fn resolve(&self, channel: &str, topic: &str, summary: &str) -> Vec<String> {
        if let Some(langs) = self.channel.get(channel) {
            if !langs.is_empty() {
                return langs.clone();
            }
        }
        let lower = summary.to_lowercase();
        for rule in &self.context {
            if rule.languages.is_empty() {
                continue;
            }
            if rule.keywords.iter().any(|k| !k.is_empty() && lower.contains(&k.to_lowercase())) {
                return rule.languages.clone();
            }
        }
        if let Some(langs) = self.topic.get(topic) {
            if !langs.is_empty() {
                return langs.clone();
            }
        }
        self.default.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEnrichmentConfig {
    pub enabled: bool,
    pub min_words: usize,
}

impl Default for LinkEnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_words: 50,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: ProviderConfig::default(),
            budget: BudgetConfig::default(),
            max_results_per_query: 10,
            max_evidence_per_item: 5,
            min_agreement: 0.3,
            dedup_similarity: 0.98,
            item_timeout: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(5),
            budget_check_interval: Duration::from_secs(5 * 60),
            domain_filter_reload_interval: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(6 * 60 * 60),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(10 * 60),
            domains: DomainFilterConfig::default(),
            query_translate: true,
            link_enrichment: LinkEnrichmentConfig::default(),
            language_routing: LanguageRoutingPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables and defaults.
    /// Recognised keys mirror the configuration surface; unknown keys
    /// are ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = env::var("ENRICHMENT_ENABLED") {
            config.enabled = parse_bool(&v, "ENRICHMENT_ENABLED")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_PROVIDERS") {
            config.providers.order = ProviderConfig::parse_order(&v);
        }
        if let Ok(v) = env::var("ENRICHMENT_PROVIDER_COOLDOWN") {
            config.providers.cooldown = parse_duration_secs(&v, "ENRICHMENT_PROVIDER_COOLDOWN")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MAX_RESULTS") {
            config.max_results_per_query = parse_usize(&v, "ENRICHMENT_MAX_RESULTS")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MAX_EVIDENCE_ITEM") {
            config.max_evidence_per_item = parse_usize(&v, "ENRICHMENT_MAX_EVIDENCE_ITEM")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MIN_AGREEMENT") {
            config.min_agreement = parse_f64(&v, "ENRICHMENT_MIN_AGREEMENT")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_DEDUP_SIMILARITY") {
            config.dedup_similarity = parse_f64(&v, "ENRICHMENT_DEDUP_SIMILARITY")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MAX_SECONDS") {
            config.item_timeout = Duration::from_secs(parse_u64(&v, "ENRICHMENT_MAX_SECONDS")?);
        }
        if let Ok(v) = env::var("ENRICHMENT_CACHE_TTL_HOURS") {
            config.cache_ttl = Duration::from_secs(parse_u64(&v, "ENRICHMENT_CACHE_TTL_HOURS")? * 3600);
        }
        if let Ok(v) = env::var("ENRICHMENT_ALLOWLIST_DOMAINS") {
            config.domains.allow = split_csv_set(&v);
            if !config.domains.allow.is_empty() {
                config.domains.mode = DomainFilterMode::Allowlist;
            }
        }
        if let Ok(v) = env::var("ENRICHMENT_DENYLIST_DOMAINS") {
            config.domains.deny = split_csv_set(&v);
            if !config.domains.deny.is_empty() && config.domains.mode == DomainFilterMode::AllowAll
            {
                config.domains.mode = DomainFilterMode::Denylist;
            }
        }
        if let Ok(v) = env::var("ENRICHMENT_DAILY_LIMIT") {
            config.budget.daily_limit = parse_u64(&v, "ENRICHMENT_DAILY_LIMIT")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MONTHLY_LIMIT") {
            config.budget.monthly_limit = parse_u64(&v, "ENRICHMENT_MONTHLY_LIMIT")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_DAILY_BUDGET_USD") {
            config.budget.daily_cap_usd = parse_f64(&v, "ENRICHMENT_DAILY_BUDGET_USD")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_MONTHLY_CAP_USD") {
            config.budget.monthly_cap_usd = parse_f64(&v, "ENRICHMENT_MONTHLY_CAP_USD")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_QUERY_TRANSLATE") {
            config.query_translate = parse_bool(&v, "ENRICHMENT_QUERY_TRANSLATE")?;
        }
        if let Ok(v) = env::var("LINK_ENRICHMENT_ENABLED") {
            config.link_enrichment.enabled = parse_bool(&v, "LINK_ENRICHMENT_ENABLED")?;
        }
        if let Ok(v) = env::var("LINK_ENRICHMENT_MIN_WORDS") {
            config.link_enrichment.min_words = parse_usize(&v, "LINK_ENRICHMENT_MIN_WORDS")?;
        }
        if let Ok(v) = env::var("WORKER_POLL_INTERVAL") {
            config.poll_interval = parse_duration_secs(&v, "WORKER_POLL_INTERVAL")?;
        }
        if let Ok(v) = env::var("ENRICHMENT_DEFAULT_LANGUAGES") {
            let langs: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !langs.is_empty() {
                config.language_routing.default = langs;
            }
        }

        Ok(config)
    }

    /// Cross-field validation, mirroring `Config::validate`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_agreement) {
            return Err(ConfigError::InvalidValue {
                key: "min_agreement".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.dedup_similarity) {
            return Err(ConfigError::InvalidValue {
                key: "dedup_similarity".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        if self.budget.daily_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "budget.daily_limit".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_evidence_per_item == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_evidence_per_item".into(),
                reason: "must be greater than 0".into(),
            });
        }
        const KNOWN_PROVIDERS: &[&str] = &[
            "yacy",
            "gdelt",
            "eventregistry",
            "newsapi",
            "searxng",
            "opensearch",
            "solr",
        ];
        for name in &self.providers.order {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "providers.order".into(),
                    reason: format!("unknown provider '{name}'"),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(v: &str, key: &str) -> Result<bool, ConfigError> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            reason: format!("'{v}' is not a recognised boolean"),
        }),
    }
}

fn parse_usize(v: &str, key: &str) -> Result<usize, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        reason: format!("'{v}' is not a valid integer"),
    })
}

fn parse_u64(v: &str, key: &str) -> Result<u64, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        reason: format!("'{v}' is not a valid integer"),
    })
}

fn parse_f64(v: &str, key: &str) -> Result<f64, ConfigError> {
    v.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        reason: format!("'{v}' is not a valid number"),
    })
}

fn parse_duration_secs(v: &str, key: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(v).map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        reason: format!("'{v}' is not a valid duration"),
    })
}

fn split_csv_set(v: &str) -> HashSet<String> {
    v.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_validate() {
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_agreement() {
        let mut cfg = WorkerConfig::default();
        cfg.min_agreement = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_provider() {
        let mut cfg = WorkerConfig::default();
        cfg.providers.order = vec!["bing".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_order_dedups_case_insensitively() {
        let order = ProviderConfig::parse_order("YaCy, gdelt,yacy, newsapi");
        assert_eq!(order, vec!["yacy", "gdelt", "newsapi"]);
    }

    #[test]
    fn language_routing_prefers_channel_over_context_topic_default() {
        let mut policy = LanguageRoutingPolicy::default();
        policy.channel.insert("technews".into(), vec!["en".into()]);
        policy.context.push(LanguageContextRule {
            name: "ukraine".into(),
            languages: vec!["uk".into()],
            keywords: vec!["kyiv".into()],
        });
        policy.topic.insert("technology".into(), vec!["de".into()]);

        assert_eq!(policy.resolve("technews", "technology", "Kyiv update"), vec!["en"]);
        assert_eq!(policy.resolve("other", "technology", "Kyiv update"), vec!["uk"]);
        assert_eq!(policy.resolve("other", "technology", "no match here"), vec!["de"]);
        assert_eq!(policy.resolve("other", "other-topic", "no match here"), vec!["en", "ru"]);
    }

    #[test]
    #[serial]
    fn from_env_reads_daily_limit() {
        std::env::set_var("ENRICHMENT_DAILY_LIMIT", "42");
        let cfg = WorkerConfig::from_env().unwrap();
        assert_eq!(cfg.budget.daily_limit, 42);
        std::env::remove_var("ENRICHMENT_DAILY_LIMIT");
    }

    #[test]
    #[serial]
    fn from_env_rejects_bad_number() {
        std::env::set_var("ENRICHMENT_DAILY_LIMIT", "not-a-number");
        assert!(WorkerConfig::from_env().is_err());
        std::env::remove_var("ENRICHMENT_DAILY_LIMIT");
    }
}
