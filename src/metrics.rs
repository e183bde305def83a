//! Fetch health metrics collection and reporting
//!
//! Tracks latency and success rate of every fetch attempt, per data source
//! (coin listing, market totals).

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for a single data source
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// Name of the data source ("coins" or "market")
    pub source: String,
    /// 50th percentile latency of successful fetches in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful fetches in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of fetch attempts
    pub total_fetches: u64,
    /// Number of failed fetch attempts
    pub failed_fetches: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_fetches: 0,
            failed_fetches: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total: u64,
    failed: u64,
}

/// Collects and computes metrics for one data source
pub struct MetricsCollector {
    source: &'static str,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a data source
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            counters: RwLock::new(Counters {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..Counters::default()
            }),
        }
    }

    /// Records a fetch attempt with its duration and outcome
    pub async fn record_fetch(&self, duration: Duration, success: bool) {
        let mut counters = self.counters.write().await;

        counters.total += 1;
        if !success {
            counters.failed += 1;
        }

        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> FetchMetrics {
        let counters = self.counters.read().await;

        if counters.samples.is_empty() {
            return FetchMetrics::empty(self.source);
        }

        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.total_cmp(b));

        let success_rate = if counters.total > 0 {
            (counters.total - counters.failed) as f64 / counters.total as f64
        } else {
            1.0
        };

        FetchMetrics {
            source: self.source.to_string(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_fetches: counters.total,
            failed_fetches: counters.failed,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("coins");

        collector.record_fetch(Duration::from_millis(100), true).await;
        collector.record_fetch(Duration::from_millis(200), true).await;
        collector.record_fetch(Duration::from_millis(150), false).await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.source, "coins");
        assert_eq!(metrics.total_fetches, 3);
        assert_eq!(metrics.failed_fetches, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_empty_metrics() {
        let collector = MetricsCollector::new("market");
        assert_eq!(collector.get_metrics().await, FetchMetrics::empty("market"));
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let collector = MetricsCollector::new("coins");
        for _ in 0..(MAX_SAMPLES + 20) {
            collector.record_fetch(Duration::from_millis(10), true).await;
        }

        assert_eq!(collector.counters.read().await.samples.len(), MAX_SAMPLES);
        assert_eq!(collector.get_metrics().await.total_fetches, (MAX_SAMPLES + 20) as u64);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        // index 4.5 rounds half away from zero
        assert_eq!(percentile(&values, 50.0), 6.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
    }
}
