//! Dispatch counters and their Prometheus text rendering

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide dispatch counters, shared through `Arc`
#[derive(Debug, Default)]
pub struct Metrics {
    dispatch_success: AtomicU64,
    dispatch_fail: AtomicU64,
    published: AtomicU64,
    publish_errors: AtomicU64,
    dead_lettered: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request classified at least one query
    pub fn dispatch_succeeded(&self) {
        self.dispatch_success.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "dispatch_success_total", "Metric incremented");
    }

    /// Request had nothing to classify
    pub fn dispatch_failed(&self) {
        self.dispatch_fail.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "dispatch_fail_total", "Metric incremented");
    }

    pub fn operation_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "dispatch_publish_errors_total", "Metric incremented");
    }

    pub fn dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "dispatch_dead_lettered_total", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatch_success: self.dispatch_success.load(Ordering::Relaxed),
            dispatch_fail: self.dispatch_fail.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub dispatch_success: u64,
    pub dispatch_fail: u64,
    pub published: u64,
    pub publish_errors: u64,
    pub dead_lettered: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition format
    pub fn render(&self) -> String {
        let counters = [
            (
                "dispatch_success_total",
                "Requests that produced at least one classification",
                self.dispatch_success,
            ),
            (
                "dispatch_fail_total",
                "Requests without any query to classify",
                self.dispatch_fail,
            ),
            (
                "dispatch_published_total",
                "Provider operations published",
                self.published,
            ),
            (
                "dispatch_publish_errors_total",
                "Requests aborted by a failed publish",
                self.publish_errors,
            ),
            (
                "dispatch_dead_lettered_total",
                "Requests moved to the dead-letter or parking-lot queue",
                self.dead_lettered,
            ),
        ];

        let mut out = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}
