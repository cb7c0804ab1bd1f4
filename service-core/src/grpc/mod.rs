//! gRPC plumbing: `AppError` to `Status` conversion and the trace-context
//! interceptor.

pub mod error;
pub mod interceptors;

pub use error::{IntoStatus, ERROR_KIND_KEY};
pub use interceptors::{
    extract_request_id, trace_context_interceptor, REQUEST_ID_KEY, TRACEPARENT_KEY,
};
