//! Prometheus metrics
//!
//! Registered lazily with the default registry on first use. The binary
//! exposes them through `prometheus::gather()`.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts};

pub static EVENTS_GENERATED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("noisegen_events_generated_total", "Total events generated"),
        &["event_type"],
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static EVENTS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("noisegen_events_sent_total", "Total events delivered"),
        &["destination"],
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static CYCLE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("noisegen_errors_total", "Total failed generate/send cycles"),
        &["kind"],
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static SEND_DURATION: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(
        HistogramOpts::new(
            "noisegen_send_duration_seconds",
            "Histogram of per-event send latency",
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("valid metric");
    prometheus::register(Box::new(h.clone())).expect("metric registered once");
    h
});

pub static RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("noisegen_running", "1 while the noise generator is running")
        .expect("valid metric");
    prometheus::register(Box::new(g.clone())).expect("metric registered once");
    g
});

/// Failure points of a cycle, used as the `kind` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingSender,
    MissingGenerator,
    Generate,
    Send,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingSender => "missing_sender",
            ErrorKind::MissingGenerator => "missing_generator",
            ErrorKind::Generate => "generate",
            ErrorKind::Send => "send",
        }
    }
}

pub fn record_error(kind: ErrorKind) {
    CYCLE_ERRORS.with_label_values(&[kind.as_str()]).inc();
}
