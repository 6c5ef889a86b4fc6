//! Error taxonomy for the enrichment pipeline.
//!
//! Retry eligibility is a whitelist, never an exclusion list: permanent
//! failures (bad JSON, malformed URLs, misconfigured keys, cancellation)
//! are surfaced on the first failure; only timeouts are retried.

use std::time::Duration;
use thiserror::Error;

use super::ids::QueueItemId;

/// Top-level error aggregating every subsystem's error enum.
#[derive(Error, Debug, Clone)]
pub enum EnrichmentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("claim extraction error: {0}")]
    Claim(#[from] ClaimError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("budget error: {0}")]
    Budget(#[from] BudgetError),

    #[error("no search providers available")]
    NoProvidersAvailable,

    #[error("item {0} exceeded its processing deadline")]
    ItemDeadlineExceeded(QueueItemId),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("missing required env var: {key}")]
    MissingRequired { key: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("{provider}: rate limited")]
    RateLimited { provider: String },

    #[error("{provider}: unexpected status {status}")]
    UnexpectedStatus { provider: String, status: u16 },

    #[error("{provider}: {message}")]
    Api { provider: String, message: String },

    #[error("{provider}: request timed out")]
    Timeout { provider: String },

    #[error("{provider}: not configured")]
    NotConfigured { provider: String },

    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("all providers failed: {last}")]
    AllFailed { last: String },
}

#[derive(Error, Debug, Clone)]
pub enum ExtractError {
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("response body was not textual content")]
    NonTextualBody,

    #[error("response exceeded the size cap of {0} bytes")]
    TooLarge(usize),

    #[error("readability extraction produced no content")]
    NoContent,

    #[error("fetch cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone)]
pub enum ClaimError {
    #[error("llm request timed out after {0:?}")]
    Timeout(Duration),

    #[error("llm call cancelled")]
    Cancelled,

    #[error("llm returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("llm provider error: {0}")]
    Provider(String),
}

impl ClaimError {
    /// Whitelist predicate: only timeouts are retryable. `Cancelled` is
    /// explicitly excluded even though it superficially resembles a
    /// transient failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClaimError::Timeout(_) => true,
            ClaimError::Provider(msg) => {
                let lower = msg.to_ascii_lowercase();
                lower.contains("deadline exceeded")
                    || lower.contains("connection timed out")
                    || lower.contains("i/o timeout")
            }
            ClaimError::Cancelled | ClaimError::InvalidJson(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug, Clone)]
pub enum BudgetError {
    #[error("daily request limit reached ({count}/{limit})")]
    DailyLimitReached { count: u64, limit: u64 },

    #[error("monthly request limit reached ({count}/{limit})")]
    MonthlyLimitReached { count: u64, limit: u64 },

    #[error("daily budget exceeded (${spent:.2}/${cap:.2})")]
    DailyBudgetExceeded { spent: f64, cap: f64 },

    #[error("monthly budget exceeded (${spent:.2}/${cap:.2})")]
    MonthlyBudgetExceeded { spent: f64, cap: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        assert!(ClaimError::Timeout(Duration::from_secs(45)).is_retryable());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!ClaimError::Cancelled.is_retryable());
    }

    #[test]
    fn invalid_json_is_not_retryable() {
        assert!(!ClaimError::InvalidJson("bad".into()).is_retryable());
    }

    #[test]
    fn provider_message_with_timeout_text_is_retryable() {
        assert!(ClaimError::Provider("i/o timeout".into()).is_retryable());
        assert!(!ClaimError::Provider("invalid api key".into()).is_retryable());
    }
}
