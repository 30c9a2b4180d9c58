use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

/// Gated requests by route and response status.
pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "credora_server_requests_total",
        "Total requests to payment-gated routes",
        &["endpoint", "status"]
    )
    .unwrap()
});

/// Payment attempts by outcome: success, rejected, invalid, error.
pub static PAYMENT_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "credora_server_payment_attempts_total",
        "Total payment attempts",
        &["result"]
    )
    .unwrap()
});

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_appear_in_output() {
        PAYMENT_ATTEMPTS.with_label_values(&["success"]).inc();
        REQUESTS.with_label_values(&["GET /premium", "200"]).inc();
        let out = metrics_output();
        assert!(out.contains("credora_server_payment_attempts_total"));
        assert!(out.contains("credora_server_requests_total"));
    }
}
