//! Prometheus metrics for clinic-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Counter for gRPC requests by method and status.
pub static GRPC_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "clinic_grpc_requests_total",
        "Total number of gRPC requests",
        &["method", "status"]
    )
    .expect("Failed to register GRPC_REQUESTS")
});

/// Histogram for gRPC request duration by method.
pub static GRPC_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "clinic_grpc_request_duration_seconds",
        "gRPC request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register GRPC_REQUEST_DURATION")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "clinic_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

pub static INVOICES_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "clinic_invoices_created_total",
        "Total number of invoices created"
    )
    .expect("Failed to register INVOICES_CREATED")
});

pub static PAYMENTS_RECORDED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "clinic_payments_recorded_total",
        "Total number of payments recorded",
        &["method"]
    )
    .expect("Failed to register PAYMENTS_RECORDED")
});

/// Sum of recorded payment amounts. Floating point; for dashboards only.
pub static PAYMENT_AMOUNT: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "clinic_payment_amount_total",
        "Sum of recorded payment amounts",
        &["method"]
    )
    .expect("Failed to register PAYMENT_AMOUNT")
});

pub static APPOINTMENTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "clinic_appointments_created_total",
        "Total number of appointments booked"
    )
    .expect("Failed to register APPOINTMENTS_CREATED")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "clinic_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&GRPC_REQUESTS);
    Lazy::force(&GRPC_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICES_CREATED);
    Lazy::force(&PAYMENTS_RECORDED);
    Lazy::force(&PAYMENT_AMOUNT);
    Lazy::force(&APPOINTMENTS_CREATED);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_grpc_request(method: &str, status: &str) {
    GRPC_REQUESTS.with_label_values(&[method, status]).inc();
}

pub fn record_grpc_request_duration(method: &str, duration_secs: f64) {
    GRPC_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}

pub fn record_invoice_created() {
    INVOICES_CREATED.inc();
}

pub fn record_payment(method: &str, amount: Decimal) {
    PAYMENTS_RECORDED.with_label_values(&[method]).inc();
    PAYMENT_AMOUNT
        .with_label_values(&[method])
        .inc_by(amount.to_f64().unwrap_or(0.0));
}

pub fn record_appointment_created() {
    APPOINTMENTS_CREATED.inc();
}
