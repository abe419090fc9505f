mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the outbox
// ============================================================================
//
// Covers both halves of the pipeline:
// - envelopes staged inside business transactions
// - publisher throughput, failures and send latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub envelopes_staged: IntCounterVec,
    pub envelopes_published: IntCounterVec,
    pub publish_failures: IntCounterVec,
    pub publish_cycles: IntCounter,
    pub publish_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let envelopes_staged = IntCounterVec::new(
            Opts::new("outbox_envelopes_staged_total", "Envelopes written to the outbox"),
            &["kind_tag"],
        )?;
        registry.register(Box::new(envelopes_staged.clone()))?;

        let envelopes_published = IntCounterVec::new(
            Opts::new("outbox_envelopes_published_total", "Envelopes acknowledged by the broker"),
            &["topic"],
        )?;
        registry.register(Box::new(envelopes_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("outbox_publish_failures_total", "Failed publish attempts"),
            &["topic"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let publish_cycles = IntCounter::new(
            "outbox_publish_cycles_total",
            "Completed publisher polling cycles",
        )?;
        registry.register(Box::new(publish_cycles.clone()))?;

        let publish_duration = HistogramVec::new(
            HistogramOpts::new("outbox_publish_duration_seconds", "Broker send latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0]),
            &["topic"],
        )?;
        registry.register(Box::new(publish_duration.clone()))?;

        Ok(Self {
            registry,
            envelopes_staged,
            envelopes_published,
            publish_failures,
            publish_cycles,
            publish_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_staged(&self, kind_tag: &str) {
        self.envelopes_staged.with_label_values(&[kind_tag]).inc();
    }

    pub fn record_published(&self, topic: &str, duration_secs: f64) {
        self.envelopes_published.with_label_values(&[topic]).inc();
        self.publish_duration.with_label_values(&[topic]).observe(duration_secs);
    }

    pub fn record_publish_failure(&self, topic: &str) {
        self.publish_failures.with_label_values(&[topic]).inc();
    }

    pub fn record_cycle(&self) {
        self.publish_cycles.inc();
    }
}
