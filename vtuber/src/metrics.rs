// Turn metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Conversation counters, shared between the controller and its turn tasks.
#[derive(Debug, Clone)]
pub struct TurnMetrics {
    pub started: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub failed: Arc<AtomicU64>,
    pub cancelled: Arc<AtomicU64>,
    pub rejected: Arc<AtomicU64>,
    pub sentences: Arc<AtomicU64>,
    pub first_increment_count: Arc<AtomicU64>,
    pub total_first_increment_ms: Arc<AtomicU64>,
    pub min_first_increment_ms: Arc<AtomicU64>,
    pub max_first_increment_ms: Arc<AtomicU64>,
}

impl TurnMetrics {
    pub fn new() -> Self {
        Self {
            started: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            sentences: Arc::new(AtomicU64::new(0)),
            first_increment_count: Arc::new(AtomicU64::new(0)),
            total_first_increment_ms: Arc::new(AtomicU64::new(0)),
            min_first_increment_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_first_increment_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, sentences: usize, first_increment_after: Option<Duration>) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.sentences.fetch_add(sentences as u64, Ordering::Relaxed);
        if let Some(latency) = first_increment_after {
            self.record_first_increment(latency.as_millis() as u64);
        }
    }

    fn record_first_increment(&self, latency_ms: u64) {
        self.first_increment_count.fetch_add(1, Ordering::Relaxed);
        self.total_first_increment_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let mut current_min = self.min_first_increment_ms.load(Ordering::Relaxed);
        while latency_ms < current_min {
            match self.min_first_increment_ms.compare_exchange_weak(
                current_min,
                latency_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_min = x,
            }
        }

        let mut current_max = self.max_first_increment_ms.load(Ordering::Relaxed);
        while latency_ms > current_max {
            match self.max_first_increment_ms.compare_exchange_weak(
                current_max,
                latency_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    pub fn avg_first_increment_ms(&self) -> f64 {
        let count = self.first_increment_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_first_increment_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let min = self.min_first_increment_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            collected_at: Utc::now(),
            turns_started: self.started.load(Ordering::Relaxed),
            turns_completed: self.completed.load(Ordering::Relaxed),
            turns_failed: self.failed.load(Ordering::Relaxed),
            turns_cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected_inputs: self.rejected.load(Ordering::Relaxed),
            sentences_spoken: self.sentences.load(Ordering::Relaxed),
            avg_first_increment_ms: self.avg_first_increment_ms(),
            min_first_increment_ms: (min != u64::MAX).then_some(min),
            max_first_increment_ms: self.max_first_increment_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub collected_at: DateTime<Utc>,
    pub turns_started: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub turns_cancelled: u64,
    pub rejected_inputs: u64,
    pub sentences_spoken: u64,
    pub avg_first_increment_ms: f64,
    pub min_first_increment_ms: Option<u64>,
    pub max_first_increment_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_min_max() {
        let m = TurnMetrics::new();
        assert_eq!(m.snapshot().min_first_increment_ms, None);

        m.record_completed(2, Some(Duration::from_millis(40)));
        m.record_completed(1, Some(Duration::from_millis(10)));
        m.record_completed(0, None);

        let s = m.snapshot();
        assert_eq!(s.turns_completed, 3);
        assert_eq!(s.sentences_spoken, 3);
        assert_eq!(s.min_first_increment_ms, Some(10));
        assert_eq!(s.max_first_increment_ms, 40);
        assert_eq!(s.avg_first_increment_ms, 25.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let m = TurnMetrics::new();
        m.record_started();
        m.record_rejected();
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["turns_started"], 1);
        assert_eq!(json["rejected_inputs"], 1);
        assert!(json["collected_at"].is_string());
    }
}
