//! Appointment booking.

use crate::error::ClinicError;
use crate::models::{Appointment, AppointmentStatus, Doctor, EntityKind, NewAppointment};
use crate::services::metrics::record_appointment_created;
use crate::services::store::{BookingConflictPolicy, BookingOutcome, ClinicStore};
use crate::services::validator::{Reference, ReferenceValidator};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn ClinicStore>,
    validator: ReferenceValidator,
    policy: BookingConflictPolicy,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn ClinicStore>, policy: BookingConflictPolicy) -> Self {
        Self {
            validator: ReferenceValidator::new(store.clone()),
            store,
            policy,
        }
    }

    pub fn policy(&self) -> BookingConflictPolicy {
        self.policy
    }

    /// Book a `scheduled` appointment with an active doctor.
    #[instrument(skip(self, input), fields(patient_id = input.patient_id, doctor_id = input.doctor_id))]
    pub async fn create_appointment(
        &self,
        input: NewAppointment,
    ) -> Result<Appointment, ClinicError> {
        self.validator
            .validate(&[
                Reference::exists(EntityKind::Patient, input.patient_id),
                Reference::exists(EntityKind::Doctor, input.doctor_id),
            ])
            .await?;

        let doctor = self.doctor(input.doctor_id).await?;
        if !doctor.is_active {
            return Err(ClinicError::InactivePractitioner(doctor.id));
        }

        match self.store.insert_appointment(&input, self.policy).await? {
            BookingOutcome::Booked(appointment) => {
                record_appointment_created();
                info!(
                    appointment_id = appointment.id,
                    date = %appointment.appointment_date,
                    "Appointment booked"
                );
                Ok(appointment)
            }
            BookingOutcome::SlotTaken => {
                warn!(
                    date = %input.appointment_date,
                    time = %input.appointment_time,
                    "Slot already booked"
                );
                Err(ClinicError::SlotConflict {
                    doctor_id: input.doctor_id,
                    date: input.appointment_date,
                    time: input.appointment_time,
                })
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn update_appointment_status(
        &self,
        appointment_id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, ClinicError> {
        let current = self.appointment(appointment_id).await?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(ClinicError::InvalidTransition {
                entity: EntityKind::Appointment,
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        match self
            .store
            .update_appointment_status(appointment_id, current.status, status)
            .await?
        {
            Some(appointment) => {
                info!(from = %current.status, to = %status, "Appointment status changed");
                Ok(appointment)
            }
            None => {
                let latest = self.appointment(appointment_id).await?;
                Err(ClinicError::InvalidTransition {
                    entity: EntityKind::Appointment,
                    from: latest.status.to_string(),
                    to: status.to_string(),
                })
            }
        }
    }

    async fn doctor(&self, doctor_id: i64) -> Result<Doctor, ClinicError> {
        self.store
            .get_doctor(doctor_id)
            .await?
            .ok_or(ClinicError::NotFound {
                kind: EntityKind::Doctor,
                id: doctor_id,
            })
    }

    async fn appointment(&self, appointment_id: i64) -> Result<Appointment, ClinicError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(ClinicError::NotFound {
                kind: EntityKind::Appointment,
                id: appointment_id,
            })
    }
}
