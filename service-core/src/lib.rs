//! Shared plumbing for the clinic services: configuration loading, the
//! infrastructure error type and its HTTP/gRPC mappings, request-id and
//! metrics middleware, and tracing setup.
pub mod config;
pub mod error;
pub mod grpc;
pub mod middleware;
pub mod observability;
