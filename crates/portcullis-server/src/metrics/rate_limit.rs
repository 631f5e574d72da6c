//! Rate-limit metrics recording.

use metrics::{counter, gauge};
use portcullis_core::{PolicyClass, SweepReport};

/// Registra las metricas de rate limiting.
pub fn register_rate_limit_metrics() {
    metrics::describe_counter!(
        "portcullis_ratelimit_decisions_total",
        "Admission decisions by policy class and outcome"
    );
    metrics::describe_counter!(
        "portcullis_ratelimit_evictions_total",
        "Idle buckets removed by the sweeper"
    );
    metrics::describe_gauge!("portcullis_ratelimit_buckets", "Live token buckets");
}

/// Registra una decision de admision.
pub fn record_decision(class: PolicyClass, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "throttled" };
    counter!(
        "portcullis_ratelimit_decisions_total",
        "class" => class.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Registra el resultado de un sweep.
pub fn record_sweep(report: SweepReport) {
    counter!("portcullis_ratelimit_evictions_total").increment(report.evicted as u64);
    gauge!("portcullis_ratelimit_buckets").set(report.remaining as f64);
}
