//! Thread-safe counters for the bridge
//!
//! Atomic counters behind a process-global instance. The bridge loop logs a
//! snapshot periodically; there is no exporter.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global metrics collector instance
pub static METRICS: Lazy<BridgeMetrics> = Lazy::new(BridgeMetrics::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static BridgeMetrics {
    &METRICS
}

/// Counters for radio intake, publishing and broker connectivity
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    // Radio intake
    lines_received: AtomicU64,
    lines_ignored: AtomicU64,
    radio_errors: AtomicU64,
    readings_decoded: AtomicU64,

    // Publishing
    fields_published: AtomicU64,
    publishes_deferred: AtomicU64,
    publish_failures: AtomicU64,

    // MQTT connectivity
    mqtt_connected: AtomicBool,
    connection_attempts: AtomicU64,
    connections_established: AtomicU64,
    connections_lost: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_received: u64,
    pub lines_ignored: u64,
    pub radio_errors: u64,
    pub readings_decoded: u64,
    pub fields_published: u64,
    pub publishes_deferred: u64,
    pub publish_failures: u64,
    pub mqtt_connected: bool,
    pub connection_attempts: u64,
    pub connections_established: u64,
    pub connections_lost: u64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Radio intake
    pub fn line_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn line_ignored(&self) {
        self.lines_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn radio_error(&self) {
        self.radio_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reading_decoded(&self) {
        self.readings_decoded.fetch_add(1, Ordering::Relaxed);
    }

    // Publishing
    pub fn field_published(&self) {
        self.fields_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_deferred(&self) {
        self.publishes_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    // MQTT connectivity
    pub fn connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(true, Ordering::Relaxed);
    }

    pub fn connection_lost(&self) {
        self.connections_lost.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_ignored: self.lines_ignored.load(Ordering::Relaxed),
            radio_errors: self.radio_errors.load(Ordering::Relaxed),
            readings_decoded: self.readings_decoded.load(Ordering::Relaxed),
            fields_published: self.fields_published.load(Ordering::Relaxed),
            publishes_deferred: self.publishes_deferred.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            mqtt_connected: self.mqtt_connected.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connections_lost: self.connections_lost.load(Ordering::Relaxed),
        }
    }
}
