//! Prometheus metrics
//!
//! Everything registers into [`REGISTRY`], which the HTTP layer exposes at
//! `/metrics`.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// HTTP request duration histogram
pub static HTTP_REQUEST_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["endpoint", "method", "status"],
        REGISTRY.clone()
    ).expect("Failed to register HTTP_REQUEST_DURATION")
});

/// HTTP request counter
pub static HTTP_REQUESTS_TOTAL: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
    register_counter_vec_with_registry!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["endpoint", "method", "status"],
        REGISTRY.clone()
    ).expect("Failed to register HTTP_REQUESTS_TOTAL")
});

/// Publish admission decisions
pub mod admission {
    use super::{
        register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
        HistogramVec, REGISTRY,
    };

    /// Decisions by outcome and reason
    pub static ADMISSION_DECISIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "admission_decisions_total",
            "Total number of admission decisions",
            &["outcome", "reason"],
            REGISTRY.clone()
        ).expect("Failed to register ADMISSION_DECISIONS")
    });

    /// Time spent deciding, including the locked transaction
    pub static ADMISSION_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "admission_duration_seconds",
            "Admission decision latency in seconds",
            &["outcome"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            REGISTRY.clone()
        ).expect("Failed to register ADMISSION_DURATION")
    });
}

/// Broadcast lifecycle notifications and revocations
pub mod lifecycle {
    use super::{register_counter_vec_with_registry, CounterVec, REGISTRY};

    /// Webhook notifications by event and outcome (updated, ignored, error)
    pub static RECONCILE_EVENTS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "lifecycle_events_total",
            "Total number of lifecycle notifications processed",
            &["event", "outcome"],
            REGISTRY.clone()
        ).expect("Failed to register RECONCILE_EVENTS")
    });

    /// Revocations by disconnect outcome (not_needed, kicked, failed)
    pub static REVOCATIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "stream_key_revocations_total",
            "Total number of stream key revocations",
            &["disconnect"],
            REGISTRY.clone()
        ).expect("Failed to register REVOCATIONS")
    });
}

/// Media server control API
pub mod media {
    use super::{register_counter_vec_with_registry, CounterVec, REGISTRY};

    /// Failed list or kick calls by connection kind
    pub static KICK_FAILURES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "media_server_kick_failures_total",
            "Total number of failed media server list/kick calls",
            &["kind", "operation"],
            REGISTRY.clone()
        ).expect("Failed to register KICK_FAILURES")
    });
}

/// Helper macro to record HTTP request metrics
#[macro_export]
macro_rules! record_http_request {
    ($endpoint:expr, $method:expr, $status:expr, $duration:expr) => {
        let status_str = $status.as_str().to_lowercase();
        let method_str = $method.to_lowercase();

        $crate::metrics::HTTP_REQUEST_DURATION
            .with_label_values(&[$endpoint, method_str.as_str(), status_str.as_str()])
            .observe($duration.as_secs_f64());

        $crate::metrics::HTTP_REQUESTS_TOTAL
            .with_label_values(&[$endpoint, method_str.as_str(), status_str.as_str()])
            .inc();
    };
}

/// Expose metrics in Prometheus format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| prometheus::Error::Msg("Invalid UTF-8".to_string()))
}
