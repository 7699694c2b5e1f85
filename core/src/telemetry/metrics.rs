use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Counters describing one session's acquisition health.
pub struct SessionMetrics {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub measurements: u64,
    pub delivered: u64,
    pub retries: u64,
    pub communication_errors: u64,
    pub saturated: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_measurement(&self, saturated: bool) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.measurements += 1;
            if saturated {
                metrics.saturated += 1;
            }
        }
    }

    /// A result reached the consumer, either through `get_next` or a handler.
    pub fn record_delivered(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.delivered += 1;
        }
    }

    pub fn record_retry(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.retries += 1;
        }
    }

    pub fn record_communication_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.communication_errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = SessionMetrics::new();
        metrics.record_measurement(false);
        metrics.record_measurement(true);
        metrics.record_delivered();
        metrics.record_retry();
        metrics.record_communication_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.measurements, 2);
        assert_eq!(snapshot.saturated, 1);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.communication_errors, 1);
    }
}
