//! Process-wide retry and polling metrics.
//!
//! Collectors are plain `prometheus` statics; [`REGISTRY`] holds all of them
//! and [`gather_metrics`] renders it in the text exposition format for
//! whatever endpoint the embedding application exposes.


use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

pub const ERROR_TYPE_RETRYABLE: &str = "retryable";
pub const ERROR_TYPE_NOT_RETRYABLE: &str = "not-retryable";

lazy_static! {
    pub static ref RETRY_SUCCESS: IntCounter =
        IntCounter::new("retry_success", "Attempts that succeeded")
            .expect("metric can not be created");

    pub static ref RETRY_SUCCESS_LATENCY_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("retry_success_latency_ms", "Latency of successful attempts in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid bucket layout"))
    )
    .expect("metric can not be created");

    pub static ref RETRY_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("retry_errors", "Failed attempts by error type"),
        &["type"]
    )
    .expect("metric can not be created");

    pub static ref RETRY_ERRORS_LATENCY_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("retry_errors_latency_ms", "Latency of failed attempts in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid bucket layout"))
    )
    .expect("metric can not be created");

    pub static ref RETRY_ERRORS_FINAL: IntCounter =
        IntCounter::new("retry_errors_final", "Tasks that failed after exhausting retries")
            .expect("metric can not be created");

    pub static ref RETRY_RETRIES: IntCounter =
        IntCounter::new("retry_retries", "Attempts made after the first one")
            .expect("metric can not be created");

    pub static ref SOURCE_POLL_ERRORS: IntCounter =
        IntCounter::new("source_poll_errors", "Transient errors returned by pollables")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry).expect("collector can be registered");
        registry
    };
}

/// Registers every collector of this crate with `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(RETRY_SUCCESS.clone()))?;
    registry.register(Box::new(RETRY_SUCCESS_LATENCY_MS.clone()))?;
    registry.register(Box::new(RETRY_ERRORS.clone()))?;
    registry.register(Box::new(RETRY_ERRORS_LATENCY_MS.clone()))?;
    registry.register(Box::new(RETRY_ERRORS_FINAL.clone()))?;
    registry.register(Box::new(RETRY_RETRIES.clone()))?;
    registry.register(Box::new(SOURCE_POLL_ERRORS.clone()))?;
    Ok(())
}

/// Text exposition of [`REGISTRY`].
pub fn gather_metrics() -> String {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(body) => body,
        Err(e) => {
            error!("metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
