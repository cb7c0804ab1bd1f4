//! In-process entity store.
//!
//! Every operation takes one lock over the whole state, which makes the
//! multi-row steps (numbering an invoice, applying a payment, checking a
//! booking slot) atomic the same way the Postgres transactions are.

use crate::models::{
    paid_amount_after, Appointment, AppointmentStatus, Campaign, CampaignStatus, CaseStudy,
    CaseStudyStatus, Company, Department, Doctor, DoctorSchedule, EntityKind, Invoice,
    InvoiceStatus, LabReport, LabReportStatus, NewAppointment, NewCampaign, NewCaseStudy,
    NewCompany, NewDepartment, NewDoctor, NewDoctorSchedule, NewInvoice, NewLabReport, NewPatient,
    NewPayment, NewPrescription, Patient, Payment, Prescription,
};
use crate::services::sequence::{format_invoice_number, TenantCounters};
use crate::services::store::{
    AppointmentFilter, BookingConflictPolicy, BookingOutcome, CampaignFilter, ClinicStore,
    ClinicalFilter, DepartmentFilter, DoctorFilter, EntityRef, InvoiceFilter, PatientFilter,
    PaymentFilter, PaymentOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Id generators, one per table, starting at 1.
#[derive(Debug, Default)]
struct IdSequences {
    next: HashMap<&'static str, i64>,
}

impl IdSequences {
    fn next(&mut self, table: &'static str) -> i64 {
        let value = self.next.entry(table).or_insert(0);
        *value += 1;
        *value
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    ids: IdSequences,
    invoice_numbers: TenantCounters,
    companies: Vec<Company>,
    departments: Vec<Department>,
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    schedules: Vec<DoctorSchedule>,
    appointments: Vec<Appointment>,
    case_studies: Vec<CaseStudy>,
    prescriptions: Vec<Prescription>,
    lab_reports: Vec<LabReport>,
    invoices: Vec<Invoice>,
    payments: Vec<Payment>,
    campaigns: Vec<Campaign>,
}

fn matches(filter: Option<i64>, value: i64) -> bool {
    filter.map_or(true, |expected| expected == value)
}

fn entity_ref(id: i64, owner_id: Option<i64>) -> EntityRef {
    EntityRef { id, owner_id }
}

/// Store backed by process memory. Rows live as long as the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn lookup(&self, kind: EntityKind, id: i64) -> Result<Option<EntityRef>, AppError> {
        let state = self.state.lock().await;
        let found = match kind {
            EntityKind::Company => state
                .companies
                .iter()
                .find(|c| c.id == id)
                .map(|c| entity_ref(c.id, None)),
            EntityKind::Department => state
                .departments
                .iter()
                .find(|d| d.id == id)
                .map(|d| entity_ref(d.id, Some(d.company_id))),
            EntityKind::Doctor => state
                .doctors
                .iter()
                .find(|d| d.id == id)
                .map(|d| entity_ref(d.id, Some(d.company_id))),
            EntityKind::Patient => state
                .patients
                .iter()
                .find(|p| p.id == id)
                .map(|p| entity_ref(p.id, Some(p.company_id))),
            EntityKind::Appointment => state
                .appointments
                .iter()
                .find(|a| a.id == id)
                .map(|a| entity_ref(a.id, Some(a.patient_id))),
            EntityKind::CaseStudy => state
                .case_studies
                .iter()
                .find(|c| c.id == id)
                .map(|c| entity_ref(c.id, Some(c.patient_id))),
            EntityKind::Invoice => state
                .invoices
                .iter()
                .find(|i| i.id == id)
                .map(|i| entity_ref(i.id, Some(i.company_id))),
        };
        Ok(found)
    }

    async fn insert_company(&self, input: &NewCompany) -> Result<Company, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let company = Company {
            id: state.ids.next("companies"),
            name: input.name.clone(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            license_number: input.license_number.clone(),
            created_at: now,
            updated_at: now,
        };
        state.companies.push(company.clone());
        Ok(company)
    }

    async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        Ok(self.state.lock().await.companies.clone())
    }

    async fn insert_department(&self, input: &NewDepartment) -> Result<Department, AppError> {
        let mut state = self.state.lock().await;
        let department = Department {
            id: state.ids.next("departments"),
            company_id: input.company_id,
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: Utc::now(),
        };
        state.departments.push(department.clone());
        Ok(department)
    }

    async fn list_departments(
        &self,
        filter: &DepartmentFilter,
    ) -> Result<Vec<Department>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .departments
            .iter()
            .filter(|d| matches(filter.company_id, d.company_id))
            .cloned()
            .collect())
    }

    async fn insert_doctor(&self, input: &NewDoctor) -> Result<Doctor, AppError> {
        let mut state = self.state.lock().await;
        let doctor = Doctor {
            id: state.ids.next("doctors"),
            company_id: input.company_id,
            department_id: input.department_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            specialization: input.specialization.clone(),
            license_number: input.license_number.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, AppError> {
        let state = self.state.lock().await;
        Ok(state.doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .doctors
            .iter()
            .filter(|d| {
                matches(filter.company_id, d.company_id)
                    && matches(filter.department_id, d.department_id)
            })
            .cloned()
            .collect())
    }

    async fn set_doctor_active(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<Option<Doctor>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.doctors.iter_mut().find(|d| d.id == id).map(|d| {
            d.is_active = is_active;
            d.clone()
        }))
    }

    async fn insert_patient(&self, input: &NewPatient) -> Result<Patient, AppError> {
        let mut state = self.state.lock().await;
        let patient = Patient {
            id: state.ids.next("patients"),
            company_id: input.company_id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            date_of_birth: input.date_of_birth,
            address: input.address.clone(),
            insurance_number: input.insurance_number.clone(),
            emergency_contact: input.emergency_contact.clone(),
            created_at: Utc::now(),
        };
        state.patients.push(patient.clone());
        Ok(patient)
    }

    async fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<Patient>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .patients
            .iter()
            .filter(|p| matches(filter.company_id, p.company_id))
            .cloned()
            .collect())
    }

    async fn insert_schedule(
        &self,
        input: &NewDoctorSchedule,
    ) -> Result<DoctorSchedule, AppError> {
        let mut state = self.state.lock().await;
        let schedule = DoctorSchedule {
            id: state.ids.next("doctor_schedules"),
            doctor_id: input.doctor_id,
            day_of_week: input.day_of_week,
            start_time: input.start_time,
            end_time: input.end_time,
            is_available: true,
            created_at: Utc::now(),
        };
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn list_schedules(&self, doctor_id: i64) -> Result<Vec<DoctorSchedule>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .schedules
            .iter()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, input), fields(doctor_id = input.doctor_id, policy = policy.as_str()))]
    async fn insert_appointment(
        &self,
        input: &NewAppointment,
        policy: BookingConflictPolicy,
    ) -> Result<BookingOutcome, AppError> {
        let mut state = self.state.lock().await;

        if policy == BookingConflictPolicy::Reject {
            let taken = state.appointments.iter().any(|a| {
                a.doctor_id == input.doctor_id
                    && a.appointment_date == input.appointment_date
                    && a.appointment_time == input.appointment_time
                    && a.status != AppointmentStatus::Cancelled
            });
            if taken {
                debug!("Slot already held");
                return Ok(BookingOutcome::SlotTaken);
            }
        }

        let appointment = Appointment {
            id: state.ids.next("appointments"),
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            appointment_date: input.appointment_date,
            appointment_time: input.appointment_time,
            status: AppointmentStatus::Scheduled,
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };
        state.appointments.push(appointment.clone());
        Ok(BookingOutcome::Booked(appointment))
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, AppError> {
        let state = self.state.lock().await;
        Ok(state.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .iter()
            .filter(|a| {
                matches(filter.doctor_id, a.doctor_id) && matches(filter.patient_id, a.patient_id)
            })
            .cloned()
            .collect())
    }

    async fn update_appointment_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .appointments
            .iter_mut()
            .find(|a| a.id == id && a.status == from)
            .map(|a| {
                a.status = to;
                a.clone()
            }))
    }

    async fn insert_case_study(&self, input: &NewCaseStudy) -> Result<CaseStudy, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let case_study = CaseStudy {
            id: state.ids.next("case_studies"),
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            title: input.title.clone(),
            diagnosis: input.diagnosis.clone(),
            treatment_plan: input.treatment_plan.clone(),
            notes: input.notes.clone(),
            status: CaseStudyStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.case_studies.push(case_study.clone());
        Ok(case_study)
    }

    async fn list_case_studies(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<CaseStudy>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .case_studies
            .iter()
            .filter(|c| {
                matches(filter.patient_id, c.patient_id) && matches(filter.doctor_id, c.doctor_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_prescription(
        &self,
        input: &NewPrescription,
    ) -> Result<Prescription, AppError> {
        let mut state = self.state.lock().await;
        let prescription = Prescription {
            id: state.ids.next("prescriptions"),
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            case_study_id: input.case_study_id,
            medication_name: input.medication_name.clone(),
            dosage: input.dosage.clone(),
            frequency: input.frequency.clone(),
            duration: input.duration.clone(),
            instructions: input.instructions.clone(),
            created_at: Utc::now(),
        };
        state.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    async fn list_prescriptions(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<Prescription>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .prescriptions
            .iter()
            .filter(|p| {
                matches(filter.patient_id, p.patient_id) && matches(filter.doctor_id, p.doctor_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_lab_report(&self, input: &NewLabReport) -> Result<LabReport, AppError> {
        let mut state = self.state.lock().await;
        let report = LabReport {
            id: state.ids.next("lab_reports"),
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            case_study_id: input.case_study_id,
            test_name: input.test_name.clone(),
            test_date: input.test_date,
            results: input.results.clone(),
            notes: input.notes.clone(),
            file_path: input.file_path.clone(),
            status: LabReportStatus::Pending,
            created_at: Utc::now(),
        };
        state.lab_reports.push(report.clone());
        Ok(report)
    }

    async fn list_lab_reports(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<LabReport>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .lab_reports
            .iter()
            .filter(|l| {
                matches(filter.patient_id, l.patient_id) && matches(filter.doctor_id, l.doctor_id)
            })
            .cloned()
            .collect())
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    async fn insert_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let mut state = self.state.lock().await;
        let sequence = state.invoice_numbers.reserve(input.company_id);
        let invoice_number = format_invoice_number(input.company_id, sequence);

        if state
            .invoices
            .iter()
            .any(|i| i.company_id == input.company_id && i.invoice_number == invoice_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number '{}' already exists for company",
                invoice_number
            )));
        }

        let invoice = Invoice {
            id: state.ids.next("invoices"),
            patient_id: input.patient_id,
            company_id: input.company_id,
            invoice_number,
            total_amount: input.total_amount,
            paid_amount: Decimal::new(0, 2),
            status: InvoiceStatus::Draft,
            due_date: input.due_date,
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };
        state.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let state = self.state.lock().await;
        Ok(state.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .iter()
            .filter(|i| {
                matches(filter.patient_id, i.patient_id) && matches(filter.company_id, i.company_id)
            })
            .cloned()
            .collect())
    }

    async fn update_invoice_status(
        &self,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .invoices
            .iter_mut()
            .find(|i| i.id == id && i.status == from)
            .map(|i| {
                i.status = to;
                i.clone()
            }))
    }

    #[instrument(skip(self, input), fields(invoice_id = input.invoice_id))]
    async fn record_payment(&self, input: &NewPayment) -> Result<PaymentOutcome, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(invoice) = state.invoices.iter_mut().find(|i| i.id == input.invoice_id) else {
            return Ok(PaymentOutcome::InvoiceMissing);
        };
        let Some(paid_amount) = paid_amount_after(invoice.paid_amount, input.amount) else {
            return Ok(PaymentOutcome::PaidAmountOverflow);
        };

        let payment = Payment {
            id: state.ids.next("payments"),
            invoice_id: input.invoice_id,
            amount: input.amount,
            payment_method: input.payment_method,
            payment_date: input.payment_date,
            reference_number: input.reference_number.clone(),
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };
        invoice.paid_amount = paid_amount;
        let invoice = invoice.clone();
        state.payments.push(payment.clone());

        Ok(PaymentOutcome::Applied { payment, invoice })
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| matches(filter.invoice_id, p.invoice_id))
            .cloned()
            .collect())
    }

    async fn insert_campaign(&self, input: &NewCampaign) -> Result<Campaign, AppError> {
        let mut state = self.state.lock().await;
        let campaign = Campaign {
            id: state.ids.next("campaigns"),
            company_id: input.company_id,
            name: input.name.clone(),
            campaign_type: input.campaign_type,
            subject: input.subject.clone(),
            message: input.message.clone(),
            status: CampaignStatus::Draft,
            scheduled_date: input.scheduled_date,
            sent_date: None,
            recipient_count: 0,
            created_at: Utc::now(),
        };
        state.campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .campaigns
            .iter()
            .filter(|c| matches(filter.company_id, c.company_id))
            .cloned()
            .collect())
    }
}
