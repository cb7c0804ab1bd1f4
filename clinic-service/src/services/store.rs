//! Entity store abstraction.
//!
//! `Database` (Postgres) is the production backend; `InMemoryStore` backs
//! local runs and the test harness. Both give the same atomicity guarantees:
//! invoice numbering and payment application happen in one unit of work.

use crate::models::{
    Appointment, AppointmentStatus, Campaign, CaseStudy, Company, Department, Doctor,
    DoctorSchedule, EntityKind, Invoice, InvoiceStatus, LabReport, NewAppointment, NewCampaign,
    NewCaseStudy, NewCompany, NewDepartment, NewDoctor, NewDoctorSchedule, NewInvoice,
    NewLabReport, NewPatient, NewPayment, NewPrescription, Patient, Payment, Prescription,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;

/// Minimal projection used by the reference validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct EntityRef {
    pub id: i64,
    /// Value of the owning foreign key, `None` for tenant roots.
    pub owner_id: Option<i64>,
}

/// How the store treats a second booking for the same doctor, date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingConflictPolicy {
    /// No slot checks; staff resolve overlaps by hand.
    #[default]
    Allow,
    /// Reject when a non-cancelled appointment already holds the slot.
    Reject,
}

impl BookingConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for BookingConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown booking conflict policy '{}'", other)),
        }
    }
}

/// Outcome of a booking attempt.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    Booked(Appointment),
    SlotTaken,
}

/// Outcome of applying a payment to an invoice.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Applied { payment: Payment, invoice: Invoice },
    InvoiceMissing,
    /// The new paid amount would not fit the amount column. Nothing was written.
    PaidAmountOverflow,
}

// ============================================================================
// Query filters (all optional, combined with AND)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DepartmentFilter {
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DoctorFilter {
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatientFilter {
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentFilter {
    pub doctor_id: Option<i64>,
    pub patient_id: Option<i64>,
}

/// Shared by case studies, prescriptions and lab reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClinicalFilter {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceFilter {
    pub patient_id: Option<i64>,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentFilter {
    pub invoice_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CampaignFilter {
    pub company_id: Option<i64>,
}

/// Durable storage for every tenant-scoped entity.
///
/// Lists are ordered by id ascending. Methods returning `Option` yield
/// `None` when the target row does not exist (or, for compare-and-set
/// updates, no longer has the expected status).
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Resolve an id to its owning foreign key.
    async fn lookup(&self, kind: EntityKind, id: i64) -> Result<Option<EntityRef>, AppError>;

    async fn insert_company(&self, input: &NewCompany) -> Result<Company, AppError>;
    async fn list_companies(&self) -> Result<Vec<Company>, AppError>;

    async fn insert_department(&self, input: &NewDepartment) -> Result<Department, AppError>;
    async fn list_departments(
        &self,
        filter: &DepartmentFilter,
    ) -> Result<Vec<Department>, AppError>;

    async fn insert_doctor(&self, input: &NewDoctor) -> Result<Doctor, AppError>;
    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, AppError>;
    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, AppError>;
    async fn set_doctor_active(&self, id: i64, is_active: bool)
        -> Result<Option<Doctor>, AppError>;

    async fn insert_patient(&self, input: &NewPatient) -> Result<Patient, AppError>;
    async fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<Patient>, AppError>;

    async fn insert_schedule(&self, input: &NewDoctorSchedule)
        -> Result<DoctorSchedule, AppError>;
    async fn list_schedules(&self, doctor_id: i64) -> Result<Vec<DoctorSchedule>, AppError>;

    /// Insert a `scheduled` appointment. Under `Reject` the slot check and
    /// the insert are one atomic step.
    async fn insert_appointment(
        &self,
        input: &NewAppointment,
        policy: BookingConflictPolicy,
    ) -> Result<BookingOutcome, AppError>;
    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, AppError>;
    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError>;
    /// Compare-and-set the status from `from` to `to`.
    async fn update_appointment_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppError>;

    async fn insert_case_study(&self, input: &NewCaseStudy) -> Result<CaseStudy, AppError>;
    async fn list_case_studies(&self, filter: &ClinicalFilter)
        -> Result<Vec<CaseStudy>, AppError>;
    async fn insert_prescription(&self, input: &NewPrescription)
        -> Result<Prescription, AppError>;
    async fn list_prescriptions(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<Prescription>, AppError>;
    async fn insert_lab_report(&self, input: &NewLabReport) -> Result<LabReport, AppError>;
    async fn list_lab_reports(&self, filter: &ClinicalFilter)
        -> Result<Vec<LabReport>, AppError>;

    /// Reserve the tenant's next invoice number and insert a `draft`
    /// invoice with nothing paid, in one unit of work.
    async fn insert_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError>;
    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError>;
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError>;
    /// Compare-and-set the status from `from` to `to`.
    async fn update_invoice_status(
        &self,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError>;

    /// Insert the payment and add its amount to the invoice's paid amount
    /// in one unit of work, serialized per invoice. The paid amount never
    /// exceeds `MAX_AMOUNT`.
    async fn record_payment(&self, input: &NewPayment) -> Result<PaymentOutcome, AppError>;
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError>;

    async fn insert_campaign(&self, input: &NewCampaign) -> Result<Campaign, AppError>;
    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, AppError>;
}
