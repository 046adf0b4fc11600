//! Prometheus metrics for mcsnap
//!
//! A batch run has no scrape endpoint; the binary writes [`Metrics::gather`]
//! to a textfile-collector file when asked to.

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use tracing::warn;

/// Metrics shared by the client and the snapshot engine
pub struct Metrics {
    pub registry: Registry,

    // Command counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_stats: IntCounter,
    pub cmd_cachedump: IntCounter,
    pub cmd_version: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Latency histograms
    pub cmd_latency: Histogram,

    // Error counters
    pub command_errors: IntCounter,
    pub item_errors: IntCounter,

    // Snapshot counters
    pub keys_exported: IntCounter,
    pub keys_restored: IntCounter,
    pub keys_skipped_expired: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric name is valid");
    registry
        .register(Box::new(counter.clone()))
        .expect("metric registered once");
    counter
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let cmd_get = counter(&registry, "mcsnap_cmd_get_total", "Total GET commands");
        let cmd_set = counter(&registry, "mcsnap_cmd_set_total", "Total SET commands");
        let cmd_stats = counter(&registry, "mcsnap_cmd_stats_total", "Total STATS commands");
        let cmd_cachedump = counter(
            &registry,
            "mcsnap_cmd_cachedump_total",
            "Total STATS CACHEDUMP commands",
        );
        let cmd_version = counter(&registry, "mcsnap_cmd_version_total", "Total VERSION commands");

        let get_hits = counter(&registry, "mcsnap_get_hits_total", "Total GET hits");
        let get_misses = counter(&registry, "mcsnap_get_misses_total", "Total GET misses");

        let cmd_latency = Histogram::with_opts(
            HistogramOpts::new("mcsnap_cmd_latency_seconds", "Command round trip in seconds")
                .buckets(vec![
                    0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
                ]),
        )
        .expect("metric name is valid");
        registry
            .register(Box::new(cmd_latency.clone()))
            .expect("metric registered once");

        let command_errors = counter(
            &registry,
            "mcsnap_command_errors_total",
            "Commands that failed or were rejected by the server",
        );
        let item_errors = counter(
            &registry,
            "mcsnap_item_errors_total",
            "Response lines that did not match the protocol grammar",
        );

        let keys_exported = counter(&registry, "mcsnap_keys_exported_total", "Keys exported");
        let keys_restored = counter(&registry, "mcsnap_keys_restored_total", "Keys restored");
        let keys_skipped_expired = counter(
            &registry,
            "mcsnap_keys_skipped_expired_total",
            "Snapshot entries skipped because they had already expired",
        );

        Self {
            registry,
            cmd_get,
            cmd_set,
            cmd_stats,
            cmd_cachedump,
            cmd_version,
            get_hits,
            get_misses,
            cmd_latency,
            command_errors,
            item_errors,
            keys_exported,
            keys_restored,
            keys_skipped_expired,
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
