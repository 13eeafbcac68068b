use serde::Serialize;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// A window with a success rate below this is unhealthy.
const MIN_SUCCESS_RATE: f64 = 80.0;
/// A window with an average latency above this is unhealthy.
const MAX_AVERAGE_LATENCY: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Counters {
    processed: u64,
    errors: u64,
    requests: u64,
    total_latency: Duration,
}

/// Accumulates per-request outcomes across workers and derives a health
/// verdict. All four counters live behind one lock and move together;
/// `requests == processed + errors` holds whenever the lock is free.
#[derive(Default)]
pub struct ConsumerHealthMonitor {
    state: RwLock<Counters>,
}

/// Metrics derived on demand from the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerMetrics {
    pub processed_count: u64,
    pub error_count: u64,
    pub average_latency: Duration,
    pub success_rate: f64,
}

/// Snapshot shape exposed on the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub processed_count: u64,
    pub error_count: u64,
    pub success_rate: f64,
    pub average_latency_ms: u64,
}

impl ConsumerHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processing(&self, request_id: &str, success: bool, latency: Duration) {
        let mut counters = self.state.write().unwrap();
        counters.requests += 1;
        counters.total_latency += latency;
        if success {
            counters.processed += 1;
        } else {
            counters.errors += 1;
        }
        debug!(request_id, success, latency_ms = latency.as_millis() as u64, "Recorded processing outcome");
    }

    pub fn metrics(&self) -> ConsumerMetrics {
        let counters = self.state.read().unwrap();

        let average_latency = if counters.requests > 0 {
            counters.total_latency / counters.requests as u32
        } else {
            Duration::ZERO
        };
        let success_rate = if counters.requests > 0 {
            counters.processed as f64 / counters.requests as f64 * 100.0
        } else {
            0.0
        };

        ConsumerMetrics {
            processed_count: counters.processed,
            error_count: counters.errors,
            average_latency,
            success_rate,
        }
    }

    /// Healthy while there is no data yet, or while the success rate and
    /// average latency stay within bounds.
    pub fn is_healthy(&self) -> bool {
        let metrics = self.metrics();

        if metrics.processed_count == 0 && metrics.error_count == 0 {
            return true;
        }
        if metrics.success_rate < MIN_SUCCESS_RATE {
            return false;
        }
        if metrics.average_latency > MAX_AVERAGE_LATENCY {
            return false;
        }
        true
    }

    /// Zero all counters. Window rollover is the caller's scheduling
    /// concern; nothing here invokes this automatically.
    pub fn reset(&self) {
        let mut counters = self.state.write().unwrap();
        *counters = Counters::default();
    }

    pub fn health_status(&self) -> HealthStatus {
        let metrics = self.metrics();
        HealthStatus {
            healthy: self.is_healthy(),
            processed_count: metrics.processed_count,
            error_count: metrics.error_count,
            success_rate: metrics.success_rate,
            average_latency_ms: metrics.average_latency.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_healthy_with_no_data() {
        let monitor = ConsumerHealthMonitor::new();
        assert!(monitor.is_healthy());
        let metrics = monitor.metrics();
        assert_eq!(metrics.processed_count, 0);
        assert_eq!(metrics.average_latency, Duration::ZERO);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[test]
    fn test_average_latency_and_success_rate() {
        let monitor = ConsumerHealthMonitor::new();
        let latencies = [100, 200, 300];
        for (i, ms) in latencies.iter().enumerate() {
            monitor.record_processing(&format!("r{i}"), true, Duration::from_millis(*ms));
        }

        let metrics = monitor.metrics();
        assert_eq!(metrics.processed_count, 3);
        assert_eq!(metrics.error_count, 0);
        assert_eq!(metrics.average_latency, Duration::from_millis(200));
        assert_eq!(metrics.success_rate, 100.0);
        assert!(monitor.is_healthy());
    }

    #[test]
    fn test_low_success_rate_is_unhealthy() {
        let monitor = ConsumerHealthMonitor::new();
        monitor.record_processing("r0", true, Duration::from_millis(10));
        for i in 1..5 {
            monitor.record_processing(&format!("r{i}"), false, Duration::from_millis(10));
        }

        let metrics = monitor.metrics();
        assert_eq!(metrics.success_rate, 20.0);
        assert!(!monitor.is_healthy());
    }

    #[test]
    fn test_slow_processing_is_unhealthy() {
        let monitor = ConsumerHealthMonitor::new();
        monitor.record_processing("r1", true, Duration::from_secs(6));
        assert!(!monitor.is_healthy());
    }

    #[test]
    fn test_reset_zeroes_metrics() {
        let monitor = ConsumerHealthMonitor::new();
        monitor.record_processing("r1", true, Duration::from_millis(50));
        monitor.record_processing("r2", false, Duration::from_millis(50));
        monitor.reset();

        let metrics = monitor.metrics();
        assert_eq!(metrics.processed_count, 0);
        assert_eq!(metrics.error_count, 0);
        assert_eq!(metrics.average_latency, Duration::ZERO);
        assert_eq!(metrics.success_rate, 0.0);
        assert!(monitor.is_healthy());
    }

    #[test]
    fn test_health_status_snapshot() {
        let monitor = ConsumerHealthMonitor::new();
        monitor.record_processing("r1", true, Duration::from_millis(1500));

        let status = monitor.health_status();
        assert!(status.healthy);
        assert_eq!(status.processed_count, 1);
        assert_eq!(status.error_count, 0);
        assert_eq!(status.success_rate, 100.0);
        assert_eq!(status.average_latency_ms, 1500);
    }

    #[tokio::test]
    async fn test_concurrent_recording_loses_no_update() {
        let monitor = Arc::new(ConsumerHealthMonitor::new());

        let mut handles = Vec::new();
        for i in 0..10u64 {
            let monitor = monitor.clone();
            handles.push(tokio::spawn(async move {
                monitor.record_processing(
                    &format!("r{i}"),
                    true,
                    Duration::from_millis(10 * (i + 1)),
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let metrics = monitor.metrics();
        assert_eq!(metrics.processed_count, 10);
        assert_eq!(metrics.error_count, 0);
        // sum(10..=100 step 10) = 550ms over 10 requests
        assert_eq!(metrics.average_latency, Duration::from_millis(55));
    }
}
