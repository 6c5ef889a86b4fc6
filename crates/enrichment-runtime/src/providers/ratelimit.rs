//! Token-bucket rate limiting: a global bucket plus one bucket per
//! domain, both built on `governor`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

type SimpleLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub fn make_limiter(rate_per_sec: u32, burst: u32) -> Arc<SimpleLimiter> {
    let rate = NonZeroU32::new(rate_per_sec.max(1)).unwrap();
    let burst = NonZeroU32::new(burst.max(1)).unwrap();
    let quota = Quota::per_second(rate).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Per-domain limiters behind an RW-mutex with double-checked insert, as
/// `WebFetcher.domainLimiters` is specified.
pub struct DomainLimiters {
    rate_per_sec: u32,
    burst: u32,
    limiters: RwLock<HashMap<String, Arc<SimpleLimiter>>>,
}

impl DomainLimiters {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, domain: &str) -> Arc<SimpleLimiter> {
        if let Some(limiter) = self.limiters.read().get(domain) {
            return limiter.clone();
        }
        let mut write = self.limiters.write();
        write
            .entry(domain.to_string())
            .or_insert_with(|| make_limiter(self.rate_per_sec, self.burst))
            .clone()
    }

    /// Waits until both the per-domain and the passed global bucket
    /// admit one request, racing the wait against `ctx` cancellation.
    /// Returns `false` without acquiring either bucket if `ctx` fires
    /// first.
    pub async fn acquire(&self, ctx: CancellationToken, domain: &str, global: &SimpleLimiter) -> bool {
        let domain_limiter = self.get(domain);
        tokio::select! {
            _ = ctx.cancelled() => false,
            _ = domain_limiter.until_ready() => {
                cancellable_until_ready(ctx, global).await
            }
        }
    }
}

/// Races a single limiter's `until_ready()` against `ctx` cancellation.
/// Returns `false` without having acquired the bucket if `ctx` fires
/// first.
pub async fn cancellable_until_ready(ctx: CancellationToken, limiter: &SimpleLimiter) -> bool {
    tokio::select! {
        _ = ctx.cancelled() => false,
        _ = limiter.until_ready() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn domain_limiters_are_independent() {
        let limiters = DomainLimiters::new(1, 1);
        let a = limiters.get("a.example.com");
        let b = limiters.get("b.example.com");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &limiters.get("a.example.com")));
    }
}
