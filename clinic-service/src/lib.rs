//! Clinic Service - multi-tenant practice management: invoice ledger,
//! appointment booking and tenant-scoped records.

pub mod config;
pub mod error;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
