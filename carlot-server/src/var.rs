use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec,
    IntCounterVec,
};

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec =
        register_int_counter_vec!(
            "http_requests_total",
            "Number of HTTP requests processed",
            &["method", "path"]
        )
        .unwrap();
    pub static ref HTTP_REQUESTS_DURATION_SECONDS: HistogramVec =
        register_histogram_vec!(
            "http_requests_duration_seconds",
            "HTTP request latency",
            &["method", "path"]
        )
        .unwrap();
}
