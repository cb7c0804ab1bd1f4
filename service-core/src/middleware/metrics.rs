use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::time::Instant;

static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "HTTP requests served on the probe listener",
        &["method", "route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS")
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency",
        &["method", "route"]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION")
});

/// Count and time requests into the default Prometheus registry.
///
/// Requests that match no route share the `unmatched` label.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[&method, &route, &status])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .observe(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_requests_are_counted_by_route() {
        let router = Router::new()
            .route("/ready", get(|| async { "ok" }))
            .layer(middleware::from_fn(metrics_middleware));

        let before = HTTP_REQUESTS
            .with_label_values(&["GET", "/ready", "200"])
            .get();
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap();

        let after = HTTP_REQUESTS
            .with_label_values(&["GET", "/ready", "200"])
            .get();
        assert_eq!(after, before + 1);
    }
}
