//! Domain error taxonomy for clinic-service.

use crate::models::EntityKind;
use chrono::{NaiveDate, NaiveTime};
use service_core::error::AppError;
use service_core::grpc::IntoStatus;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::Status;

pub use service_core::grpc::ERROR_KIND_KEY;

/// Typed rejections raised by the validator and the engines.
///
/// Everything except `Store` is a domain outcome the caller can act on;
/// `Store` is an opaque infrastructure failure.
#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("{kind} with ID {id} is not part of {} {expected_owner}", .kind.owner_label())]
    OwnershipMismatch {
        kind: EntityKind,
        id: i64,
        expected_owner: i64,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Doctor with ID {0} is not active")]
    InactivePractitioner(i64),

    #[error("Doctor with ID {doctor_id} is already booked on {date} at {}", .time.format("%H:%M"))]
    SlotConflict {
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: EntityKind,
        from: String,
        to: String,
    },

    #[error(transparent)]
    Store(#[from] AppError),
}

impl ClinicError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount(message.into())
    }

    /// Machine-readable kind, used for the `x-error-kind` metadata and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { kind, .. } => kind.not_found_kind(),
            Self::OwnershipMismatch { .. } => "tenant_mismatch",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidInput(_) => "invalid_input",
            Self::InactivePractitioner(_) => "inactive_practitioner",
            Self::SlotConflict { .. } => "slot_conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Store(inner) => inner.kind(),
        }
    }
}

impl From<validator::ValidationErrors> for ClinicError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

impl From<ClinicError> for Status {
    fn from(err: ClinicError) -> Self {
        let kind = err.kind();
        let mut status = match err {
            ClinicError::Store(inner) => return inner.into_status(),
            ClinicError::NotFound { .. } => Status::not_found(err.to_string()),
            ClinicError::InvalidAmount(_) | ClinicError::InvalidInput(_) => {
                Status::invalid_argument(err.to_string())
            }
            ClinicError::SlotConflict { .. } => Status::already_exists(err.to_string()),
            ClinicError::OwnershipMismatch { .. }
            | ClinicError::InactivePractitioner(_)
            | ClinicError::InvalidTransition { .. } => {
                Status::failed_precondition(err.to_string())
            }
        };
        status
            .metadata_mut()
            .insert(ERROR_KIND_KEY, MetadataValue::from_static(kind));
        status
    }
}
