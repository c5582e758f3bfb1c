//! Prometheus metrics for the bridge
//!
//! The pipeline reports named events here; `GET /metrics` exposes them.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Counter: inbound events by disposition (completed, aborted, failed, ignored reasons)
    pub static ref EVENTS: CounterVec = register_counter_vec!(
        "bugbridge_events_total",
        "Inbound webhook events by disposition",
        &["disposition"]
    )
    .expect("Failed to create events metric");

    /// Histogram: whole pipeline run duration per phase (seconds)
    pub static ref PIPELINE_DURATION: HistogramVec = register_histogram_vec!(
        "bugbridge_pipeline_duration_seconds",
        "Duration of pipeline runs",
        &["phase"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create pipeline_duration metric");

    /// Histogram: single step duration (seconds)
    pub static ref STEP_DURATION: HistogramVec = register_histogram_vec!(
        "bugbridge_step_duration_seconds",
        "Duration of individual pipeline steps",
        &["step"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create step_duration metric");

    /// Counter: step executions by outcome
    pub static ref STEPS: CounterVec = register_counter_vec!(
        "bugbridge_steps_total",
        "Step executions by outcome",
        &["step", "outcome"]
    )
    .expect("Failed to create steps metric");

    /// Counter: pipeline runs by rule tag, phase and outcome
    pub static ref PIPELINES: CounterVec = register_counter_vec!(
        "bugbridge_pipelines_total",
        "Pipeline runs by rule, phase and outcome",
        &["tag", "phase", "outcome"]
    )
    .expect("Failed to create pipelines metric");

    /// Counter: calls to the external trackers
    pub static ref TRACKER_CALLS: CounterVec = register_counter_vec!(
        "bugbridge_tracker_calls_total",
        "Tracker API calls by tracker, method and result",
        &["tracker", "method", "result"]
    )
    .expect("Failed to create tracker_calls metric");

    /// Gauge: rules in the active registry
    pub static ref RULES_LOADED: Gauge = register_gauge!(
        "bugbridge_rules_loaded",
        "Number of rules in the active registry"
    )
    .expect("Failed to create rules_loaded metric");
}

/// Count one inbound event
pub fn record_event(disposition: &str) {
    EVENTS.with_label_values(&[disposition]).inc();
}

pub fn record_pipeline(tag: &str, phase: &str, outcome: &str, duration_secs: f64) {
    PIPELINES.with_label_values(&[tag, phase, outcome]).inc();
    PIPELINE_DURATION
        .with_label_values(&[phase])
        .observe(duration_secs);
}

pub fn record_step(step: &str, outcome: &str, duration_secs: f64) {
    STEPS.with_label_values(&[step, outcome]).inc();
    STEP_DURATION.with_label_values(&[step]).observe(duration_secs);
}

/// Count a tracker call; `result` is "ok" or an error kind
pub fn record_tracker_call(tracker: &str, method: &str, result: &str) {
    TRACKER_CALLS
        .with_label_values(&[tracker, method, result])
        .inc();
}

pub fn set_rules_loaded(count: usize) {
    RULES_LOADED.set(count as f64);
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::BridgeError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::BridgeError::Other(format!("Metrics are not UTF-8: {}", e)))
}
