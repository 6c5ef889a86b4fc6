//! Telemetry trait and a minimal file-backed exporter.
//!
//! The actual counters/histograms collaborator is out of scope for this
//! crate; this module only defines the narrow trait the worker calls
//! into, plus a no-op default and a file-backed implementation for
//! local runs.

use std::collections::HashMap;
use std::sync::Mutex;

pub mod file;

/// Counter/histogram sink the worker reports through. Labels are a flat
/// string map (provider name, outcome, etc.).
pub trait Metrics: Send + Sync {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Persists any buffered metrics. Sinks that write on every call
    /// (or don't buffer at all) can leave this as a no-op; the worker
    /// calls it on the same cadence as its cleanup pass.
    fn flush(&self) {}
}

/// Discards everything. The default when no exporter is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn incr_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// In-process accumulator, useful for tests that assert on emitted
/// counters without touching the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
    histograms: Mutex<HashMap<String, Vec<f64>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, labels: &[(&str, &str)]) -> String {
        let mut s = name.to_string();
        for (k, v) in labels {
            s.push(':');
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(&Self::key(name, labels))
            .copied()
            .unwrap_or(0)
    }
}

impl Metrics for InMemoryMetrics {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(Self::key(name, labels))
            .or_insert(0) += 1;
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.histograms
            .lock()
            .unwrap()
            .entry(Self::key(name, labels))
            .or_default()
            .push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_counts() {
        let m = InMemoryMetrics::new();
        m.incr_counter("evidence.persisted", &[("provider", "gdelt")]);
        m.incr_counter("evidence.persisted", &[("provider", "gdelt")]);
        m.incr_counter("evidence.persisted", &[("provider", "newsapi")]);
        assert_eq!(m.counter("evidence.persisted", &[("provider", "gdelt")]), 2);
        assert_eq!(m.counter("evidence.persisted", &[("provider", "newsapi")]), 1);
    }
}
