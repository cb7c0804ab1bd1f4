//! Read-side list operations. Filters are optional and combine with AND.

use crate::error::ClinicError;
use crate::models::{
    Appointment, Campaign, CaseStudy, Company, Department, Doctor, DoctorSchedule, Invoice,
    LabReport, Patient, Payment, Prescription,
};
use crate::services::store::{
    AppointmentFilter, CampaignFilter, ClinicStore, ClinicalFilter, DepartmentFilter,
    DoctorFilter, InvoiceFilter, PatientFilter, PaymentFilter,
};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn ClinicStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>, ClinicError> {
        Ok(self.store.list_companies().await?)
    }

    #[instrument(skip(self))]
    pub async fn list_departments(
        &self,
        filter: DepartmentFilter,
    ) -> Result<Vec<Department>, ClinicError> {
        Ok(self.store.list_departments(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_doctors(&self, filter: DoctorFilter) -> Result<Vec<Doctor>, ClinicError> {
        Ok(self.store.list_doctors(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_patients(&self, filter: PatientFilter) -> Result<Vec<Patient>, ClinicError> {
        Ok(self.store.list_patients(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_schedules(&self, doctor_id: i64) -> Result<Vec<DoctorSchedule>, ClinicError> {
        Ok(self.store.list_schedules(doctor_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, ClinicError> {
        Ok(self.store.list_appointments(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_case_studies(
        &self,
        filter: ClinicalFilter,
    ) -> Result<Vec<CaseStudy>, ClinicError> {
        Ok(self.store.list_case_studies(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_prescriptions(
        &self,
        filter: ClinicalFilter,
    ) -> Result<Vec<Prescription>, ClinicError> {
        Ok(self.store.list_prescriptions(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_lab_reports(
        &self,
        filter: ClinicalFilter,
    ) -> Result<Vec<LabReport>, ClinicError> {
        Ok(self.store.list_lab_reports(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_invoices(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, ClinicError> {
        Ok(self.store.list_invoices(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>, ClinicError> {
        Ok(self.store.list_payments(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_campaigns(
        &self,
        filter: CampaignFilter,
    ) -> Result<Vec<Campaign>, ClinicError> {
        Ok(self.store.list_campaigns(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCompany, NewInvoice, NewPatient};
    use crate::services::memory::InMemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn seed(store: &InMemoryStore) -> (i64, i64, Vec<i64>) {
        let mut companies = Vec::new();
        for name in ["North", "South"] {
            let company = store
                .insert_company(&NewCompany {
                    name: name.to_string(),
                    address: "1 Main St".to_string(),
                    phone: "555-0100".to_string(),
                    email: "desk@clinic.example".to_string(),
                    license_number: format!("LIC-{}", name),
                })
                .await
                .unwrap();
            companies.push(company.id);
        }

        let mut patients = Vec::new();
        for company_id in [companies[0], companies[0], companies[1]] {
            let patient = store
                .insert_patient(&NewPatient {
                    company_id,
                    first_name: "Pat".to_string(),
                    last_name: "Doe".to_string(),
                    email: None,
                    phone: "555-0101".to_string(),
                    date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 5).unwrap(),
                    address: "3 Elm St".to_string(),
                    insurance_number: None,
                    emergency_contact: None,
                })
                .await
                .unwrap();
            patients.push(patient.id);
        }

        (companies[0], companies[1], patients)
    }

    #[tokio::test]
    async fn test_filters_combine_with_and() {
        let store = Arc::new(InMemoryStore::new());
        let (north, south, patients) = seed(&store).await;
        for (patient_id, company_id) in [
            (patients[0], north),
            (patients[1], north),
            (patients[0], north),
            (patients[2], south),
        ] {
            store
                .insert_invoice(&NewInvoice {
                    patient_id,
                    company_id,
                    total_amount: Decimal::new(1000, 2),
                    due_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                    notes: None,
                })
                .await
                .unwrap();
        }
        let facade = QueryFacade::new(store);

        let all = facade.list_invoices(InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let north_only = facade
            .list_invoices(InvoiceFilter {
                company_id: Some(north),
                patient_id: None,
            })
            .await
            .unwrap();
        assert_eq!(north_only.len(), 3);

        let one_patient = facade
            .list_invoices(InvoiceFilter {
                company_id: Some(north),
                patient_id: Some(patients[0]),
            })
            .await
            .unwrap();
        assert_eq!(one_patient.len(), 2);

        let none = facade
            .list_invoices(InvoiceFilter {
                company_id: Some(south),
                patient_id: Some(patients[0]),
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_patients_by_company() {
        let store = Arc::new(InMemoryStore::new());
        let (north, _, _) = seed(&store).await;
        let facade = QueryFacade::new(store);

        let patients = facade
            .list_patients(PatientFilter {
                company_id: Some(north),
            })
            .await
            .unwrap();
        assert_eq!(patients.len(), 2);
        assert!(patients.iter().all(|p| p.company_id == north));
        assert_eq!(facade.list_companies().await.unwrap().len(), 2);
    }
}
