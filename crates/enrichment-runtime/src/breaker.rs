//! Per-provider circuit breaker.
//!
//! Closed → Open → HalfOpen → Closed state machine guarding each search
//! provider independently. No timers: the Open→HalfOpen transition is
//! checked lazily whenever `can_attempt` is called.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit trips open.
    pub failure_threshold: u32,
    /// Minimum time the circuit stays open before probing again.
    pub reset_after: Duration,
    /// Consecutive half-open successes required to close the circuit.
    pub half_open_successes_to_close: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_after: Duration::from_secs(5 * 60),
            half_open_successes_to_close: 2,
        }
    }
}

/// A single provider's failure guard. Each instance is meant to be
/// wrapped in its own mutex; `can_attempt` both queries and mutates state.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failures: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failures: 0,
            success_count: 0,
            last_failure: None,
        }
    }

    /// The sole query. May transition Open → HalfOpen if the reset
    /// window has elapsed.
    pub fn can_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() > self.config.reset_after {
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        match self.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.half_open_successes_to_close {
                    self.state = CircuitState::Closed;
                    self.success_count = 0;
                }
            }
            CircuitState::Open { .. } => {
                // An attempt succeeded without going through HalfOpen
                // (e.g. a stale in-flight request); treat it as recovery.
                self.state = CircuitState::Closed;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.last_failure = Some(Instant::now());
        match self.state {
            CircuitState::Closed => {
                self.failures += 1;
                if self.failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            CircuitState::HalfOpen => {
                self.success_count = 0;
                self.state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
            }
            CircuitState::Open { .. } => {
                self.failures += 1;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }
}

/// Per-provider registry of breakers, guarded individually so contention
/// on one provider never blocks another.
#[derive(Default)]
pub struct BreakerTable {
    breakers: DashMap<String, Mutex<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl BreakerTable {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn register(&self, provider: &str) {
        self.breakers
            .entry(provider.to_string())
            .or_insert_with(|| Mutex::new(CircuitBreaker::new(self.config.clone())));
    }

    pub fn can_attempt(&self, provider: &str) -> bool {
        self.breakers
            .entry(provider.to_string())
            .or_insert_with(|| Mutex::new(CircuitBreaker::new(self.config.clone())))
            .lock()
            .unwrap()
            .can_attempt()
    }

    pub fn record_success(&self, provider: &str) {
        if let Some(entry) = self.breakers.get(provider) {
            entry.lock().unwrap().record_success();
        }
    }

    pub fn record_failure(&self, provider: &str) {
        self.breakers
            .entry(provider.to_string())
            .or_insert_with(|| Mutex::new(CircuitBreaker::new(self.config.clone())))
            .lock()
            .unwrap()
            .record_failure();
    }

    pub fn state_of(&self, provider: &str) -> Option<CircuitState> {
        self.breakers.get(provider).map(|e| e.lock().unwrap().state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_after: Duration::from_millis(5),
            half_open_successes_to_close: 2,
        }
    }

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(short_config());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn trips_open_after_threshold() {
        let mut cb = CircuitBreaker::new(short_config());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
        assert!(!cb.can_attempt());
    }

    #[test]
    fn half_open_requires_two_successes_to_close() {
        let mut cb = CircuitBreaker::new(short_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.can_attempt());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let mut cb = CircuitBreaker::new(short_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.can_attempt());
        cb.record_failure();
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
    }

    #[test]
    fn success_resets_failure_count() {
        let mut cb = CircuitBreaker::new(short_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn breaker_opens_then_skips_provider() {
        let table = BreakerTable::new(short_config());
        table.register("a");
        table.register("b");
        for _ in 0..3 {
            table.record_failure("a");
        }
        assert!(!table.can_attempt("a"));
        assert!(table.can_attempt("b"));
    }
}
