//! Translates generated queries into target languages, backed by the
//! storage collaborator's translation cache.

use chrono::Duration;
use tokio_util::sync::CancellationToken;

use crate::store::EnrichmentStore;
use crate::translate::Translator;
use crate::types::{GeneratedQuery, QueryStrategy};

const DEFAULT_TTL: Duration = Duration::days(7);

pub struct Expander<'a> {
    store: &'a dyn EnrichmentStore,
    translator: &'a dyn Translator,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a dyn EnrichmentStore, translator: &'a dyn Translator) -> Self {
        Self { store, translator }
    }

    /// Returns the union of originals already in a target language and
    /// translated variants, capped at `cap`. When every original is
    /// off-target, only translations are returned.
    pub async fn expand(
        &self,
        _ctx: CancellationToken,
        queries: Vec<GeneratedQuery>,
        target_langs: &[String],
        cap: usize,
    ) -> Vec<GeneratedQuery> {
        let mut out = Vec::new();

        for query in &queries {
            if target_langs.iter().any(|l| l == &query.language) {
                out.push(query.clone());
            }
        }

        'outer: for query in &queries {
            for target in target_langs {
                if &query.language == target {
                    continue;
                }
                if out.len() >= cap {
                    break 'outer;
                }
                if let Some(translated) = self.translate_cached(&query.query, target).await {
                    out.push(GeneratedQuery {
                        query: translated,
                        strategy: format!("{}_translated", query.strategy),
                        language: target.clone(),
                    });
                }
            }
        }

        out.truncate(cap);
        out
    }

    async fn translate_cached(&self, text: &str, target_lang: &str) -> Option<String> {
        if let Ok(Some(cached)) = self.store.get_translation(text, target_lang).await {
            return Some(cached);
        }
        let translated = self.translator.translate(text, target_lang).await.ok()?;
        let _ = self
            .store
            .save_translation(text, target_lang, &translated, DEFAULT_TTL)
            .await;
        Some(translated)
    }
}

/// The `<strategy>_translated` label; kept for callers that have a
/// typed `QueryStrategy` rather than the free-form string on
/// `GeneratedQuery`.
pub fn translated_label(strategy: QueryStrategy) -> String {
    strategy.translated_label()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::translate::MockTranslator;

    #[tokio::test]
    async fn expands_off_target_queries_and_keeps_on_target_originals() {
        let store = InMemoryStore::default();
        let translator = MockTranslator;
        let expander = Expander::new(&store, &translator);

        let queries = vec![GeneratedQuery {
            query: "Apple Inc sales".into(),
            strategy: "entity".into(),
            language: "en".into(),
        }];

        let expanded = expander
            .expand(CancellationToken::new(), queries, &["en".to_string(), "ru".to_string()], 10)
            .await;

        assert!(expanded.iter().any(|q| q.language == "en"));
        assert!(expanded.iter().any(|q| q.language == "ru" && q.strategy == "entity_translated"));
    }
}
