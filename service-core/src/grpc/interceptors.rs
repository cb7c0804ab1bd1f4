//! Request correlation for gRPC calls.
//!
//! Every call leaves the interceptor with an `x-request-id`, the caller's or a
//! fresh one, so handlers can stamp it on their spans and error logs.

use tonic::metadata::MetadataValue;
use tonic::{Request, Status};
use uuid::Uuid;

pub const TRACEPARENT_KEY: &str = "traceparent";
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Ensures an `x-request-id` is present and logs any incoming `traceparent`.
///
/// ```ignore
/// let svc = ClinicServiceServer::with_interceptor(service, trace_context_interceptor);
/// ```
#[allow(clippy::result_large_err)]
pub fn trace_context_interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    if extract_request_id(&request).is_none() {
        let minted = Uuid::new_v4().to_string();
        if let Ok(value) = MetadataValue::try_from(minted.as_str()) {
            request.metadata_mut().insert(REQUEST_ID_KEY, value);
        }
    }

    if let Some(traceparent) = metadata_str(&request, TRACEPARENT_KEY) {
        tracing::debug!(
            traceparent = %traceparent,
            request_id = ?extract_request_id(&request),
            "Inbound trace context"
        );
    }

    Ok(request)
}

pub fn extract_request_id<T>(request: &Request<T>) -> Option<String> {
    metadata_str(request, REQUEST_ID_KEY)
}

fn metadata_str<T>(request: &Request<T>, key: &str) -> Option<String> {
    request
        .metadata()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
