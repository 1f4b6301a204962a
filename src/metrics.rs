use crate::predictor::PredictorMode;
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all curator metrics
const PREFIX: &str = "affect_curator";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref SUBMISSIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_submissions_total"), "Clip submissions by outcome"),
        &["outcome"]
    ).expect("Failed to create submissions_total metric");

    pub static ref RESOLUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_resolutions_total"), "Candidate resolutions by outcome"),
        &["outcome"]
    ).expect("Failed to create resolutions_total metric");

    pub static ref PREDICTOR_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_predictor_calls_total"), "Predictor invocations"),
        &["mode", "status"]
    ).expect("Failed to create predictor_calls_total metric");

    pub static ref PREDICTOR_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_predictor_duration_seconds"),
            "Predictor invocation duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["mode"]
    ).expect("Failed to create predictor_duration_seconds metric");

    pub static ref PENDING_QUEUE_SIZE: Gauge = Gauge::new(
        format!("{PREFIX}_pending_queue_size"),
        "Candidates awaiting a human rating"
    ).expect("Failed to create pending_queue_size metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(SUBMISSIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RESOLUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PREDICTOR_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PREDICTOR_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PENDING_QUEUE_SIZE.clone()));

    tracing::debug!("Metrics registered");
}

pub fn record_submission(outcome: &str) {
    SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_resolution(outcome: &str) {
    RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_predictor_call(mode: PredictorMode, status: &str, duration: Duration) {
    PREDICTOR_CALLS_TOTAL
        .with_label_values(&[mode.as_str(), status])
        .inc();
    PREDICTOR_DURATION_SECONDS
        .with_label_values(&[mode.as_str()])
        .observe(duration.as_secs_f64());
}

pub fn set_pending_queue_size(size: usize) {
    PENDING_QUEUE_SIZE.set(size as f64);
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
