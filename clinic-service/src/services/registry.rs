//! Tenant, practitioner, patient and clinical record registration.
//!
//! Each create runs field validation, then a scope check against the
//! entities it references, then a single insert.

use crate::error::ClinicError;
use crate::models::{
    Campaign, CaseStudy, Company, Department, Doctor, DoctorSchedule, EntityKind, LabReport,
    NewCampaign, NewCaseStudy, NewCompany, NewDepartment, NewDoctor, NewDoctorSchedule,
    NewLabReport, NewPatient, NewPrescription, Patient, Prescription,
};
use crate::services::store::ClinicStore;
use crate::services::validator::{Reference, ReferenceValidator};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ClinicStore>,
    validator: ReferenceValidator,
}

impl Registry {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            validator: ReferenceValidator::new(store.clone()),
            store,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_company(&self, input: NewCompany) -> Result<Company, ClinicError> {
        input.validate()?;
        Ok(self.store.insert_company(&input).await?)
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    pub async fn create_department(
        &self,
        input: NewDepartment,
    ) -> Result<Department, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[Reference::exists(EntityKind::Company, input.company_id)])
            .await?;
        Ok(self.store.insert_department(&input).await?)
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id, department_id = input.department_id))]
    pub async fn create_doctor(&self, input: NewDoctor) -> Result<Doctor, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[
                Reference::exists(EntityKind::Company, input.company_id),
                Reference::owned_by(EntityKind::Department, input.department_id, input.company_id),
            ])
            .await?;
        Ok(self.store.insert_doctor(&input).await?)
    }

    /// Toggle whether the doctor can take new bookings.
    #[instrument(skip(self))]
    pub async fn set_doctor_active(
        &self,
        doctor_id: i64,
        is_active: bool,
    ) -> Result<Doctor, ClinicError> {
        let doctor = self
            .store
            .set_doctor_active(doctor_id, is_active)
            .await?
            .ok_or(ClinicError::NotFound {
                kind: EntityKind::Doctor,
                id: doctor_id,
            })?;
        info!(is_active = is_active, "Doctor availability changed");
        Ok(doctor)
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    pub async fn create_patient(&self, input: NewPatient) -> Result<Patient, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[Reference::exists(EntityKind::Company, input.company_id)])
            .await?;
        Ok(self.store.insert_patient(&input).await?)
    }

    #[instrument(skip(self, input), fields(doctor_id = input.doctor_id))]
    pub async fn create_schedule(
        &self,
        input: NewDoctorSchedule,
    ) -> Result<DoctorSchedule, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[Reference::exists(EntityKind::Doctor, input.doctor_id)])
            .await?;
        Ok(self.store.insert_schedule(&input).await?)
    }

    #[instrument(skip(self, input), fields(patient_id = input.patient_id, doctor_id = input.doctor_id))]
    pub async fn create_case_study(&self, input: NewCaseStudy) -> Result<CaseStudy, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[
                Reference::exists(EntityKind::Patient, input.patient_id),
                Reference::exists(EntityKind::Doctor, input.doctor_id),
            ])
            .await?;
        Ok(self.store.insert_case_study(&input).await?)
    }

    #[instrument(skip(self, input), fields(patient_id = input.patient_id, doctor_id = input.doctor_id))]
    pub async fn create_prescription(
        &self,
        input: NewPrescription,
    ) -> Result<Prescription, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&clinical_refs(
                input.patient_id,
                input.doctor_id,
                input.case_study_id,
            ))
            .await?;
        Ok(self.store.insert_prescription(&input).await?)
    }

    #[instrument(skip(self, input), fields(patient_id = input.patient_id, doctor_id = input.doctor_id))]
    pub async fn create_lab_report(&self, input: NewLabReport) -> Result<LabReport, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&clinical_refs(
                input.patient_id,
                input.doctor_id,
                input.case_study_id,
            ))
            .await?;
        Ok(self.store.insert_lab_report(&input).await?)
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    pub async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign, ClinicError> {
        input.validate()?;
        self.validator
            .validate(&[Reference::exists(EntityKind::Company, input.company_id)])
            .await?;
        Ok(self.store.insert_campaign(&input).await?)
    }
}

/// A linked case study must belong to the same patient.
fn clinical_refs(patient_id: i64, doctor_id: i64, case_study_id: Option<i64>) -> Vec<Reference> {
    let mut refs = vec![
        Reference::exists(EntityKind::Patient, patient_id),
        Reference::exists(EntityKind::Doctor, doctor_id),
    ];
    if let Some(case_study_id) = case_study_id {
        refs.push(Reference::owned_by(
            EntityKind::CaseStudy,
            case_study_id,
            patient_id,
        ));
    }
    refs
}
