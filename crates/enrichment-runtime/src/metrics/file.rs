//! File-backed metrics exporter: periodic JSON snapshots written
//! atomically (write to a temp path, then rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use super::Metrics;

#[derive(Debug, Serialize, Default)]
struct Snapshot {
    counters: HashMap<String, u64>,
}

pub struct FileMetrics {
    path: PathBuf,
    counters: Mutex<HashMap<String, u64>>,
}

impl FileMetrics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            counters: Mutex::new(HashMap::new()),
        }
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

    /// Writes the current snapshot to a sibling `.tmp` file then renames
    /// it into place, so readers never observe a partial write.
    pub fn flush(&self) -> std::io::Result<()> {
        let snapshot = Snapshot {
            counters: self.counters.lock().unwrap().clone(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl Metrics for FileMetrics {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)]) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(Self::key(name, labels))
            .or_insert(0) += 1;
    }

    fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {
        // Histograms are not persisted by the file exporter; only
        // counters are cheap enough to snapshot on every increment.
    }

    fn flush(&self) {
        if let Err(err) = FileMetrics::flush(self) {
            tracing::warn!(error = %err, path = %self.path.display(), "failed to write metrics snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_writes_valid_json() {
        let dir = std::env::temp_dir().join(format!("enrichment-metrics-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("metrics.json");
        let m = FileMetrics::new(&path);
        m.incr_counter("x", &[]);
        m.flush().unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("\"x\""));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
