//! Reference validation.
//!
//! Confirms that every id a mutation points at exists and, where an owner
//! is given, belongs to that owner. Checks run in order and stop at the
//! first failure. Read-only.

use crate::error::ClinicError;
use crate::models::EntityKind;
use crate::services::store::ClinicStore;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One id to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: EntityKind,
    pub id: i64,
    /// Required value of the entity's owning foreign key.
    pub expected_owner: Option<i64>,
}

impl Reference {
    pub fn exists(kind: EntityKind, id: i64) -> Self {
        Self {
            kind,
            id,
            expected_owner: None,
        }
    }

    pub fn owned_by(kind: EntityKind, id: i64, owner: i64) -> Self {
        Self {
            kind,
            id,
            expected_owner: Some(owner),
        }
    }
}

#[derive(Clone)]
pub struct ReferenceValidator {
    store: Arc<dyn ClinicStore>,
}

impl ReferenceValidator {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, refs), fields(count = refs.len()))]
    pub async fn validate(&self, refs: &[Reference]) -> Result<(), ClinicError> {
        for reference in refs {
            let found = self
                .store
                .lookup(reference.kind, reference.id)
                .await?
                .ok_or(ClinicError::NotFound {
                    kind: reference.kind,
                    id: reference.id,
                })?;

            if let Some(expected_owner) = reference.expected_owner {
                if found.owner_id != Some(expected_owner) {
                    debug!(
                        kind = %reference.kind,
                        id = reference.id,
                        expected_owner = expected_owner,
                        actual_owner = ?found.owner_id,
                        "Reference owned by another scope"
                    );
                    return Err(ClinicError::OwnershipMismatch {
                        kind: reference.kind,
                        id: reference.id,
                        expected_owner,
                    });
                }
            }
        }
        Ok(())
    }
}
