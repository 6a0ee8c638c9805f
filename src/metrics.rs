//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Instant;

pub struct Metrics {
    registry: Registry,

    // Counters
    pub flows_started: IntCounter,
    pub flows_committed: IntCounter,
    pub flows_failed: IntCounterVec,
    pub chip_attachments: IntCounter,
    pub endorsements_collected: IntCounter,
    pub notary_submissions: IntCounter,
    pub notary_conflicts: IntCounter,

    // Histograms
    pub flow_latency: Histogram,
    pub endorsement_latency: Histogram,
    pub finality_latency: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let flows_started = IntCounter::with_opts(Opts::new(
            "flows_started_total",
            "Return flows started",
        ))?;

        let flows_committed = IntCounter::with_opts(Opts::new(
            "flows_committed_total",
            "Return flows that committed",
        ))?;

        let flows_failed = IntCounterVec::new(
            Opts::new("flows_failed_total", "Return flows that failed"),
            &["category"],
        )?;

        let chip_attachments = IntCounter::with_opts(Opts::new(
            "chip_attachments_total",
            "Chip attachment transactions committed",
        ))?;

        let endorsements_collected = IntCounter::with_opts(Opts::new(
            "endorsements_collected_total",
            "Counter-party endorsements received",
        ))?;

        let notary_submissions = IntCounter::with_opts(Opts::new(
            "notary_submissions_total",
            "Transactions submitted to the notary",
        ))?;

        let notary_conflicts = IntCounter::with_opts(Opts::new(
            "notary_conflicts_total",
            "Transactions rejected by the notary as double spends",
        ))?;

        let flow_latency = Histogram::with_opts(
            HistogramOpts::new("flow_latency_seconds", "End to end flow latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let endorsement_latency = Histogram::with_opts(
            HistogramOpts::new("endorsement_latency_seconds", "Signature collection latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let finality_latency = Histogram::with_opts(
            HistogramOpts::new("finality_latency_seconds", "Notarisation and distribution latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        registry.register(Box::new(flows_started.clone()))?;
        registry.register(Box::new(flows_committed.clone()))?;
        registry.register(Box::new(flows_failed.clone()))?;
        registry.register(Box::new(chip_attachments.clone()))?;
        registry.register(Box::new(endorsements_collected.clone()))?;
        registry.register(Box::new(notary_submissions.clone()))?;
        registry.register(Box::new(notary_conflicts.clone()))?;
        registry.register(Box::new(flow_latency.clone()))?;
        registry.register(Box::new(endorsement_latency.clone()))?;
        registry.register(Box::new(finality_latency.clone()))?;

        Ok(Self {
            registry,
            flows_started,
            flows_committed,
            flows_failed,
            chip_attachments,
            endorsements_collected,
            notary_submissions,
            notary_conflicts,
            flow_latency,
            endorsement_latency,
            finality_latency,
        })
    }

    pub fn record_failure(&self, category: &str) {
        self.flows_failed.with_label_values(&[category]).inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let mut buf = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
