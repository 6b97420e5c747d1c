//! Prometheus metrics for cms-service.
//!
//! Exposes CMS-specific collectors and an HTTP handler for the `/metrics`
//! endpoint.

use actix_web::HttpResponse;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static::lazy_static! {
    /// Rendered-page cache events by outcome (hit/miss/error)
    pub static ref PAGE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "cms_page_cache_events_total",
        "Rendered-page cache events by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Scheduled-post publisher runs by outcome
    pub static ref PUBLISHER_RUNS: IntCounterVec = register_int_counter_vec!(
        "cms_publisher_runs_total",
        "Scheduled-post publisher runs by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Media processing jobs by kind (optimize/variants) and outcome
    pub static ref MEDIA_JOBS: IntCounterVec = register_int_counter_vec!(
        "cms_media_jobs_total",
        "Media processing jobs by kind and outcome",
        &["kind", "outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Agent invocations by kind and outcome
    pub static ref AGENT_INVOCATIONS: IntCounterVec = register_int_counter_vec!(
        "cms_agent_invocations_total",
        "Agent invocations by kind and outcome",
        &["kind", "outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// HTTP request latency by method and matched path
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "cms_request_duration_seconds",
        "HTTP request latency",
        &["method", "path"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
