//! Domain models for clinic-service.

mod appointment;
mod campaign;
mod clinical;
mod company;
mod invoice;
mod patient;
mod practitioner;

pub use appointment::{Appointment, AppointmentStatus, NewAppointment};
pub use campaign::{Campaign, CampaignStatus, CampaignType, NewCampaign};
pub use clinical::{
    CaseStudy, CaseStudyStatus, LabReport, LabReportStatus, NewCaseStudy, NewLabReport,
    NewPrescription, Prescription,
};
pub use company::{Company, Department, NewCompany, NewDepartment};
pub use invoice::{Invoice, InvoiceStatus, NewInvoice, NewPayment, Payment, PaymentMethod};
pub use patient::{NewPatient, Patient};
pub use practitioner::{Doctor, DoctorSchedule, NewDoctor, NewDoctorSchedule};

use crate::error::ClinicError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use prost_types::Timestamp;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Entity kinds the reference validator can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Company,
    Department,
    Doctor,
    Patient,
    Appointment,
    CaseStudy,
    Invoice,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Department => "Department",
            Self::Doctor => "Doctor",
            Self::Patient => "Patient",
            Self::Appointment => "Appointment",
            Self::CaseStudy => "Case study",
            Self::Invoice => "Invoice",
        }
    }

    /// The kind whose id is stored in this entity's owning foreign key.
    pub fn owner(&self) -> Option<EntityKind> {
        match self {
            Self::Company => None,
            Self::Department | Self::Doctor | Self::Patient | Self::Invoice => Some(Self::Company),
            Self::Appointment | Self::CaseStudy => Some(Self::Patient),
        }
    }

    pub fn owner_label(&self) -> &'static str {
        self.owner().map(|k| k.as_str()).unwrap_or("owner")
    }

    pub fn not_found_kind(&self) -> &'static str {
        match self {
            Self::Company => "company_not_found",
            Self::Department => "department_not_found",
            Self::Doctor => "doctor_not_found",
            Self::Patient => "patient_not_found",
            Self::Appointment => "appointment_not_found",
            Self::CaseStudy => "case_study_not_found",
            Self::Invoice => "invoice_not_found",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Value parsing and formatting
// ============================================================================

static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").expect("time-of-day pattern is valid")
});

/// Largest value a NUMERIC(12, 2) column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ClinicError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ClinicError::invalid_input(format!("{} must be a date in YYYY-MM-DD format", field))
    })
}

/// Parse a 24-hour `HH:MM` time of day. Single-digit hours are accepted.
pub fn parse_time_of_day(field: &str, value: &str) -> Result<NaiveTime, ClinicError> {
    let invalid =
        || ClinicError::invalid_input(format!("{} must be a time in HH:MM format", field));

    let caps = TIME_OF_DAY.captures(value.trim()).ok_or_else(invalid)?;
    let hour: u32 = caps[1].parse().map_err(|_| invalid())?;
    let minute: u32 = caps[2].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse a strictly positive monetary amount with at most two decimal places.
pub fn parse_amount(field: &str, value: &str) -> Result<Decimal, ClinicError> {
    let amount = Decimal::from_str(value.trim()).map_err(|_| {
        ClinicError::invalid_amount(format!("{} must be a decimal number", field))
    })?;
    validate_amount(field, amount)
}

pub fn validate_amount(field: &str, amount: Decimal) -> Result<Decimal, ClinicError> {
    if amount <= Decimal::ZERO {
        return Err(ClinicError::invalid_amount(format!(
            "{} must be greater than zero",
            field
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(ClinicError::invalid_amount(format!(
            "{} must have at most two decimal places",
            field
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(ClinicError::invalid_amount(format!("{} is too large", field)));
    }
    let mut amount = amount;
    amount.rescale(2);
    Ok(amount)
}

/// The paid amount after applying `amount`, or `None` when it would not fit
/// the amount column.
pub fn paid_amount_after(paid: Decimal, amount: Decimal) -> Option<Decimal> {
    paid.checked_add(amount).filter(|total| *total <= MAX_AMOUNT)
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

pub(crate) fn timestamp_to_datetime(ts: &Timestamp) -> Result<DateTime<Utc>, ClinicError> {
    DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32)
        .ok_or_else(|| ClinicError::invalid_input("timestamp is out of range"))
}

/// Trim an optional text field, dropping it when blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
