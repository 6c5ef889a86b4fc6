//! Evidence enrichment pipeline: turns a queued item summary into
//! multi-lingual search queries, fans them out across a circuit-broken
//! provider registry, extracts and scores candidate article claims, and
//! writes graded evidence back through the storage collaborator.
//!
//! The crate is organised leaves-first, matching the component order of
//! the system it implements: circuit breaker, provider registry and
//! search providers, content extractor, claim extractor, scorer, query
//! generator/expander, and finally the worker that drives all of them.

pub mod breaker;
pub mod claims;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod llm;
pub mod metrics;
pub mod providers;
pub mod query;
pub mod scorer;
pub mod store;
pub mod translate;
pub mod types;
pub mod worker;

pub use config::WorkerConfig;
pub use store::EnrichmentStore;
pub use worker::EnrichmentWorker;
