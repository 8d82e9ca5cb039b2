//! Latency and throughput metrics for the tick-to-trade pipeline.
//!
//! Per-stage histograms back onto `hdrhistogram` rather than a hand-rolled
//! sorted-sample cache; a rolling 1s window derives throughput; a bounded
//! alert log records SLA breaches.

use hdrhistogram::Histogram;
use hft_common::Clock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

pub const STAGE_NAMES: [&str; 7] = [
    "tick_to_trade",
    "feed_handler",
    "book_update",
    "fpga_pipeline",
    "risk_check",
    "order_routing",
    "exchange_round_trip",
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub avg_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
}

/// Wraps one `hdrhistogram::Histogram<u64>` for a single named stage.
pub struct LatencyMetric {
    histogram: Histogram<u64>,
}

impl LatencyMetric {
    fn new() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(1, 60_000_000_000, 3)
                .expect("fixed, valid histogram bounds"),
        }
    }

    pub fn record(&mut self, latency_ns: u64) {
        let _ = self.histogram.record(latency_ns);
    }

    #[must_use]
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.histogram.len(),
            avg_ns: self.histogram.mean(),
            min_ns: self.histogram.min(),
            max_ns: self.histogram.max(),
            p50_ns: self.histogram.value_at_percentile(50.0),
            p95_ns: self.histogram.value_at_percentile(95.0),
            p99_ns: self.histogram.value_at_percentile(99.0),
            p999_ns: self.histogram.value_at_percentile(99.9),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub alert_type: &'static str,
    pub message: String,
    pub timestamp_ns: u64,
}

/// Centralized metrics collector for the pipeline. Not thread-shared; owned
/// by the monitoring loop, which is the only writer.
pub struct MetricsCollector {
    stages: HashMap<&'static str, LatencyMetric>,
    throughput_window: VecDeque<(Instant, &'static str)>,
    event_counts: HashMap<&'static str, u64>,
    alerts: Vec<Alert>,
    alert_threshold_us: u64,
    start: Instant,
    clock: Arc<Clock>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(alert_99th_percentile_us: u64, clock: Arc<Clock>) -> Self {
        let mut stages = HashMap::new();
        for name in STAGE_NAMES {
            stages.insert(name, LatencyMetric::new());
        }
        Self {
            stages,
            throughput_window: VecDeque::new(),
            event_counts: HashMap::new(),
            alerts: Vec::new(),
            alert_threshold_us: alert_99th_percentile_us,
            start: Instant::now(),
            clock,
        }
    }

    /// Panics if `stage` is not one of `STAGE_NAMES`; callers always pass a
    /// compile-time constant.
    pub fn record_latency(&mut self, stage: &'static str, latency_ns: u64) {
        self.stages.get_mut(stage).expect("unknown stage name").record(latency_ns);
    }

    pub fn record_event(&mut self, event_name: &'static str) {
        *self.event_counts.entry(event_name).or_insert(0) += 1;
        self.throughput_window.push_back((Instant::now(), event_name));
        self.recalc_throughput();
    }

    fn recalc_throughput(&mut self) {
        let cutoff = Instant::now() - std::time::Duration::from_secs(1);
        while let Some(&(ts, _)) = self.throughput_window.front() {
            if ts < cutoff {
                self.throughput_window.pop_front();
            } else {
                break;
            }
        }
    }

    #[must_use]
    pub fn events_per_second(&self) -> f64 {
        self.throughput_window.len() as f64
    }

    #[must_use]
    pub fn orders_per_second(&self) -> f64 {
        self.throughput_window.iter().filter(|(_, e)| *e == "order").count() as f64
    }

    #[must_use]
    pub fn fills_per_second(&self) -> f64 {
        self.throughput_window.iter().filter(|(_, e)| *e == "fill").count() as f64
    }

    /// Fires a `LATENCY_P99` alert when `tick_to_trade`'s p99 exceeds the
    /// configured threshold.
    pub fn check_alerts(&mut self) {
        let p99_ns = self.stages["tick_to_trade"].summary().p99_ns;
        if p99_ns > self.alert_threshold_us * 1_000 {
            let message = format!(
                "tick-to-trade p99 at {:.1}us exceeds {}us threshold",
                p99_ns as f64 / 1_000.0,
                self.alert_threshold_us
            );
            tracing::warn!(p99_ns, threshold_us = self.alert_threshold_us, "{message}");
            self.alerts.push(Alert {
                alert_type: "LATENCY_P99",
                message,
                timestamp_ns: self.clock.now().ts.as_nanos(),
            });
            if self.alerts.len() > 100 {
                self.alerts = self.alerts.split_off(self.alerts.len() - 50);
            }
        }
    }

    #[must_use]
    pub fn summary(&self, stage: &str) -> Option<LatencySummary> {
        self.stages.get(stage).map(LatencyMetric::summary)
    }

    #[must_use]
    pub fn recent_alerts(&self, n: usize) -> Vec<Alert> {
        self.alerts.iter().rev().take(n).cloned().collect()
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_are_monotonic() {
        let mut m = MetricsCollector::new(100, Arc::new(Clock::new()));
        for i in 1..=1000u64 {
            m.record_latency("tick_to_trade", i * 1000);
        }
        let s = m.summary("tick_to_trade").unwrap();
        assert!(s.p50_ns <= s.p95_ns);
        assert!(s.p95_ns <= s.p99_ns);
        assert!(s.p99_ns <= s.p999_ns);
    }

    #[test]
    fn alert_fires_when_p99_exceeds_threshold() {
        let mut m = MetricsCollector::new(10, Arc::new(Clock::new()));
        for _ in 0..1000 {
            m.record_latency("tick_to_trade", 50_000);
        }
        m.check_alerts();
        assert_eq!(m.recent_alerts(10).len(), 1);
        assert_eq!(m.recent_alerts(10)[0].alert_type, "LATENCY_P99");
    }

    #[test]
    fn alert_log_trims_to_fifty_on_overflow() {
        let mut m = MetricsCollector::new(1, Arc::new(Clock::new()));
        for _ in 0..200 {
            m.record_latency("tick_to_trade", 10_000);
            m.check_alerts();
        }
        assert!(m.alerts.len() <= 100);
    }

    #[test]
    fn throughput_counts_orders_and_fills_separately() {
        let mut m = MetricsCollector::new(100, Arc::new(Clock::new()));
        m.record_event("order");
        m.record_event("order");
        m.record_event("fill");
        assert_eq!(m.orders_per_second(), 2.0);
        assert_eq!(m.fills_per_second(), 1.0);
        assert_eq!(m.events_per_second(), 3.0);
    }
}
