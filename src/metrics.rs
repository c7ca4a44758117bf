use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    files_analyzed: AtomicU64,
    files_failed: AtomicU64,
    units_extracted: AtomicU64,
    units_dropped: AtomicU64,
    merge_calls: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one analyzed file.
    pub fn record_file(&self, succeeded: bool) {
        self.files_analyzed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.files_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the outcome of one extraction unit.
    pub fn record_unit(&self, extracted: bool) {
        if extracted {
            self.units_extracted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.units_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one LLM-mediated merge call.
    pub fn record_merge_call(&self) {
        self.merge_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_analyzed: self.files_analyzed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            units_extracted: self.units_extracted.load(Ordering::Relaxed),
            units_dropped: self.units_dropped.load(Ordering::Relaxed),
            merge_calls: self.merge_calls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of files routed through an analyzer since startup.
    pub files_analyzed: u64,
    /// Number of files whose pipeline failed outright.
    pub files_failed: u64,
    /// Number of units that produced a validated record.
    pub units_extracted: u64,
    /// Number of units dropped after extraction failures.
    pub units_dropped: u64,
    /// Number of LLM merge calls issued across all reduce rounds.
    pub merge_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_files_and_units() {
        let metrics = PipelineMetrics::new();
        metrics.record_file(true);
        metrics.record_file(false);
        metrics.record_unit(true);
        metrics.record_unit(true);
        metrics.record_unit(false);
        metrics.record_merge_call();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_analyzed, 2);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.units_extracted, 2);
        assert_eq!(snapshot.units_dropped, 1);
        assert_eq!(snapshot.merge_calls, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = PipelineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_analyzed, 0);
        assert_eq!(snapshot.units_extracted, 0);
        assert_eq!(snapshot.merge_calls, 0);
    }
}
