//! Performance measurement utilities
//!
//! Wall-clock helpers and a small aggregator used to watch the cost of
//! trigger passes and other host-visible operations.

/// Milliseconds from a monotonic-enough clock. Uses the browser
/// `Performance` API on WASM targets.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Performance monitor for measuring operation times
pub struct PerformanceMonitor {
    measurements: std::collections::HashMap<String, Vec<f64>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            measurements: std::collections::HashMap::new(),
        }
    }

    pub fn record_measurement(&mut self, operation: &str, duration_ms: f64) {
        self.measurements
            .entry(operation.to_string())
            .or_default()
            .push(duration_ms);
    }

    pub fn get_average_time(&self, operation: &str) -> Option<f64> {
        self.measurements.get(operation).map(|times| {
            if times.is_empty() {
                0.0
            } else {
                times.iter().sum::<f64>() / times.len() as f64
            }
        })
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_time() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_measurement("pass", 2.0);
        monitor.record_measurement("pass", 4.0);
        assert_eq!(monitor.get_average_time("pass"), Some(3.0));
        assert_eq!(monitor.get_average_time("other"), None);
    }
}
