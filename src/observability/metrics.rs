//! Metrics collection.
//!
//! # Metrics
//! - `cluster_config_collect_total` (counter): collects by backend, outcome
//! - `cluster_config_publish_total` (counter): publishes by backend, outcome
//! - `cluster_config_cas_conflicts_total` (counter): failed CAS commits of an "all" publish
//! - `cluster_config_integrity_failures_total` (counter): values rejected by the check function

fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

/// Record a finished collect.
pub fn record_collect<T, E>(backend: &'static str, result: &Result<T, E>) {
    ::metrics::counter!(
        "cluster_config_collect_total",
        "backend" => backend,
        "outcome" => outcome(result)
    )
    .increment(1);
}

/// Record a finished publish.
pub fn record_publish<T, E>(backend: &'static str, result: &Result<T, E>) {
    ::metrics::counter!(
        "cluster_config_publish_total",
        "backend" => backend,
        "outcome" => outcome(result)
    )
    .increment(1);
}

/// Record a lost CAS round.
pub fn record_cas_conflict(backend: &'static str) {
    ::metrics::counter!("cluster_config_cas_conflicts_total", "backend" => backend).increment(1);
}

/// Record a rejected value.
pub fn record_integrity_failure(backend: &'static str) {
    ::metrics::counter!("cluster_config_integrity_failures_total", "backend" => backend)
        .increment(1);
}
