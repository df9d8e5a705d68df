//! # Scheduler Metrics
//!
//! Prometheus-compatible metrics for the downlink scheduler:
//!
//! - **Counters**: rounds, scheduled cells, grants, skips per reason, messages
//! - **Gauges**: accumulated power control steps, terminals in the last round
//! - **Histograms**: round latency
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use ransched_core::mac::RoundStats;
//! use ransched_core::observe::SchedulerMetrics;
//!
//! let metrics = SchedulerMetrics::new();
//!
//! let mut stats = RoundStats::default();
//! stats.new_grants = 3;
//! stats.tpc_accumulated = -1;
//! metrics.record_round(&stats, 1, Duration::from_micros(180));
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.grants_new, 3);
//! assert_eq!(snapshot.tpc_accumulated, -1);
//! ```

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::mac::{RoundStats, SkipReason};

/// A simple atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// A simple atomic gauge (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    #[inline]
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, v: i64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A simple histogram with fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    boundaries: Vec<f64>,
    /// `boundaries.len() + 1` buckets, the last one for overflow
    buckets: Vec<AtomicU64>,
    /// Sum of observations, ×1000
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency_us()
    }
}

impl Histogram {
    pub fn new(boundaries: Vec<f64>) -> Self {
        let num_buckets = boundaries.len() + 1;
        Self {
            boundaries,
            buckets: (0..num_buckets).map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Buckets for round latencies in microseconds, centred on the 1 ms TTI.
    pub fn latency_us() -> Self {
        Self::new(vec![
            10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2000.0, 5000.0,
        ])
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&b| value < b)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn reset(&self) {
        for b in &self.buckets {
            b.store(0, Ordering::Relaxed);
        }
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Metrics of one scheduler instance, shared with the exporter.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub rounds: Counter,
    /// Rounds that exceeded the TTI budget
    pub overruns: Counter,
    pub cells_scheduled: Counter,
    pub cells_not_due: Counter,
    pub reserved_subframes: Counter,
    pub grants_new: Counter,
    pub grants_retx: Counter,
    pub skipped: [Counter; SkipReason::ALL.len()],
    pub messages: Counter,
    /// Running sum of issued power control steps
    pub tpc_accumulated: Gauge,
    pub round_latency_us: Histogram,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one round into the totals.
    pub fn record_round(&self, stats: &RoundStats, messages: usize, latency: Duration) {
        self.rounds.inc();
        self.cells_scheduled.inc_by(stats.cells_scheduled as u64);
        self.cells_not_due.inc_by(stats.cells_not_due as u64);
        self.reserved_subframes.inc_by(stats.reserved_subframes as u64);
        self.grants_new.inc_by(stats.new_grants as u64);
        self.grants_retx.inc_by(stats.retx_grants as u64);
        for reason in SkipReason::ALL {
            self.skipped[reason.index()].inc_by(stats.skips(reason) as u64);
        }
        self.messages.inc_by(messages as u64);
        self.tpc_accumulated.add(stats.tpc_accumulated as i64);
        self.round_latency_us.observe(latency.as_secs_f64() * 1e6);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds: self.rounds.get(),
            overruns: self.overruns.get(),
            cells_scheduled: self.cells_scheduled.get(),
            cells_not_due: self.cells_not_due.get(),
            reserved_subframes: self.reserved_subframes.get(),
            grants_new: self.grants_new.get(),
            grants_retx: self.grants_retx.get(),
            skipped: SkipReason::ALL.map(|r| self.skipped[r.index()].get()),
            messages: self.messages.get(),
            tpc_accumulated: self.tpc_accumulated.get(),
            round_latency_count: self.round_latency_us.count(),
            round_latency_sum_us: self.round_latency_us.sum(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.rounds.reset();
        self.overruns.reset();
        self.cells_scheduled.reset();
        self.cells_not_due.reset();
        self.reserved_subframes.reset();
        self.grants_new.reset();
        self.grants_retx.reset();
        for c in &self.skipped {
            c.reset();
        }
        self.messages.reset();
        self.tpc_accumulated.set(0);
        self.round_latency_us.reset();
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        counter(&mut out, "rounds", "Scheduling rounds run", s.rounds);
        counter(&mut out, "overruns", "Rounds exceeding the TTI", s.overruns);
        counter(&mut out, "cells_scheduled", "Cells scheduled", s.cells_scheduled);
        counter(&mut out, "messages", "Downlink configurations emitted", s.messages);

        let _ = writeln!(out, "# HELP ransched_grants_total Committed downlink grants");
        let _ = writeln!(out, "# TYPE ransched_grants_total counter");
        let _ = writeln!(out, "ransched_grants_total{{kind=\"new\"}} {}", s.grants_new);
        let _ = writeln!(out, "ransched_grants_total{{kind=\"retx\"}} {}", s.grants_retx);

        let _ = writeln!(out, "# HELP ransched_skipped_total Terminals skipped by reason");
        let _ = writeln!(out, "# TYPE ransched_skipped_total counter");
        for reason in SkipReason::ALL {
            let _ = writeln!(
                out,
                "ransched_skipped_total{{reason=\"{}\"}} {}",
                reason,
                s.skipped[reason.index()]
            );
        }

        let _ = writeln!(out, "# HELP ransched_tpc_accumulated Sum of power control steps");
        let _ = writeln!(out, "# TYPE ransched_tpc_accumulated gauge");
        let _ = writeln!(out, "ransched_tpc_accumulated {}", s.tpc_accumulated);

        let _ = writeln!(out, "# HELP ransched_round_latency_us Round latency in microseconds");
        let _ = writeln!(out, "# TYPE ransched_round_latency_us summary");
        let _ = writeln!(out, "ransched_round_latency_us_sum {}", s.round_latency_sum_us);
        let _ = writeln!(out, "ransched_round_latency_us_count {}", s.round_latency_count);

        out
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP ransched_{}_total {}", name, help);
    let _ = writeln!(out, "# TYPE ransched_{}_total counter", name);
    let _ = writeln!(out, "ransched_{}_total {}", name, value);
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub rounds: u64,
    pub overruns: u64,
    pub cells_scheduled: u64,
    pub cells_not_due: u64,
    pub reserved_subframes: u64,
    pub grants_new: u64,
    pub grants_retx: u64,
    pub skipped: [u64; SkipReason::ALL.len()],
    pub messages: u64,
    pub tpc_accumulated: i64,
    pub round_latency_count: u64,
    pub round_latency_sum_us: f64,
}

impl MetricsSnapshot {
    pub fn avg_latency_us(&self) -> f64 {
        if self.round_latency_count == 0 {
            0.0
        } else {
            self.round_latency_sum_us / self.round_latency_count as f64
        }
    }

    pub fn skips(&self, reason: SkipReason) -> u64 {
        self.skipped[reason.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.inc_by(99);
        assert_eq!(counter.get(), 100);

        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new();
        gauge.set(3);
        gauge.add(-5);
        assert_eq!(gauge.get(), -2);
    }

    #[test]
    fn test_histogram() {
        let hist = Histogram::new(vec![10.0, 100.0, 1000.0]);

        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(500.0);
        hist.observe(5000.0);

        assert_eq!(hist.count(), 4);
        assert!((hist.sum() - 5555.0).abs() < 0.01);
        assert_eq!(hist.bucket_counts(), vec![1, 1, 1, 1]);

        hist.reset();
        assert_eq!(hist.count(), 0);
    }

    #[test]
    fn test_record_round() {
        let metrics = SchedulerMetrics::new();

        let mut stats = RoundStats::default();
        stats.cells_scheduled = 2;
        stats.new_grants = 4;
        stats.retx_grants = 1;
        stats.record_skip(SkipReason::CceExhausted);
        stats.tpc_accumulated = 2;
        metrics.record_round(&stats, 2, Duration::from_micros(300));

        stats.tpc_accumulated = -3;
        metrics.record_round(&stats, 1, Duration::from_micros(100));

        let s = metrics.snapshot();
        assert_eq!(s.rounds, 2);
        assert_eq!(s.grants_new, 8);
        assert_eq!(s.grants_retx, 2);
        assert_eq!(s.skips(SkipReason::CceExhausted), 2);
        assert_eq!(s.skips(SkipReason::NoPayload), 0);
        assert_eq!(s.messages, 3);
        assert_eq!(s.tpc_accumulated, -1);
        assert!((s.avg_latency_us() - 200.0).abs() < 1.0);

        metrics.reset();
        assert_eq!(metrics.snapshot().rounds, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = SchedulerMetrics::new();
        let mut stats = RoundStats::default();
        stats.new_grants = 7;
        stats.record_skip(SkipReason::NoHarqProcess);
        metrics.record_round(&stats, 1, Duration::from_micros(50));

        let output = metrics.to_prometheus();
        assert!(output.contains("ransched_rounds_total 1"));
        assert!(output.contains("# TYPE ransched_rounds_total counter"));
        assert!(output.contains("ransched_grants_total{kind=\"new\"} 7"));
        assert!(output.contains("ransched_skipped_total{reason=\"no_harq_process\"} 1"));
    }
}
