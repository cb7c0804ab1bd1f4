//! `AppError` to `tonic::Status`.
//!
//! | AppError | Status | x-error-kind |
//! |----------|--------|--------------|
//! | `Conflict` | `ALREADY_EXISTS` | `conflict` |
//! | `DatabaseError` | `INTERNAL` | `store_error` |
//! | `ConfigError`, `InternalError` | `INTERNAL` | `config_error`, `internal` |
//!
//! Only the public message crosses the wire; the cause is logged.

use tonic::metadata::MetadataValue;
use tonic::Status;

use crate::error::AppError;

/// Metadata key carrying the machine-readable error kind on failed RPCs.
pub const ERROR_KIND_KEY: &str = "x-error-kind";

pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl IntoStatus for AppError {
    fn into_status(self) -> Status {
        tracing::error!(error = %self, kind = self.kind(), "Infrastructure failure");

        let message = self.public_message();
        let mut status = match self {
            AppError::Conflict(_) => Status::already_exists(message),
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                Status::internal(message)
            }
        };
        status
            .metadata_mut()
            .insert(ERROR_KIND_KEY, MetadataValue::from_static(self.kind()));
        status
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.into_status()
    }
}
