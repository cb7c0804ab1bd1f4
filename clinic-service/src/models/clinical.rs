//! Clinical records: case studies, prescriptions and lab reports.

use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseStudyStatus {
    Active,
    Completed,
    OnHold,
}

impl CaseStudyStatus {
    pub fn to_proto(self) -> i32 {
        let status = match self {
            Self::Active => proto::CaseStudyStatus::Active,
            Self::Completed => proto::CaseStudyStatus::Completed,
            Self::OnHold => proto::CaseStudyStatus::OnHold,
        };
        status as i32
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub title: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub notes: Option<String>,
    pub status: CaseStudyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewCaseStudy {
    pub patient_id: i64,
    pub doctor_id: i64,
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Diagnosis is required"))]
    pub diagnosis: String,
    #[validate(length(min = 1, message = "Treatment plan is required"))]
    pub treatment_plan: String,
    pub notes: Option<String>,
}

impl From<CaseStudy> for proto::CaseStudy {
    fn from(c: CaseStudy) -> Self {
        Self {
            id: c.id,
            patient_id: c.patient_id,
            doctor_id: c.doctor_id,
            title: c.title,
            diagnosis: c.diagnosis,
            treatment_plan: c.treatment_plan,
            notes: c.notes,
            status: c.status.to_proto(),
            created_at: Some(datetime_to_timestamp(c.created_at)),
            updated_at: Some(datetime_to_timestamp(c.updated_at)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub case_study_id: Option<i64>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewPrescription {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub case_study_id: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Medication name is required"))]
    pub medication_name: String,
    #[validate(length(min = 1, max = 100, message = "Dosage is required"))]
    pub dosage: String,
    #[validate(length(min = 1, max = 100, message = "Frequency is required"))]
    pub frequency: String,
    #[validate(length(min = 1, max = 100, message = "Duration is required"))]
    pub duration: String,
    pub instructions: Option<String>,
}

impl From<Prescription> for proto::Prescription {
    fn from(p: Prescription) -> Self {
        Self {
            id: p.id,
            patient_id: p.patient_id,
            doctor_id: p.doctor_id,
            case_study_id: p.case_study_id,
            medication_name: p.medication_name,
            dosage: p.dosage,
            frequency: p.frequency,
            duration: p.duration,
            instructions: p.instructions,
            created_at: Some(datetime_to_timestamp(p.created_at)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LabReportStatus {
    Pending,
    Completed,
    Reviewed,
}

impl LabReportStatus {
    pub fn to_proto(self) -> i32 {
        let status = match self {
            Self::Pending => proto::LabReportStatus::Pending,
            Self::Completed => proto::LabReportStatus::Completed,
            Self::Reviewed => proto::LabReportStatus::Reviewed,
        };
        status as i32
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LabReport {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub case_study_id: Option<i64>,
    pub test_name: String,
    pub test_date: NaiveDate,
    pub results: String,
    pub notes: Option<String>,
    pub file_path: Option<String>,
    pub status: LabReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewLabReport {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub case_study_id: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Test name is required"))]
    pub test_name: String,
    pub test_date: NaiveDate,
    #[validate(length(min = 1, message = "Results are required"))]
    pub results: String,
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "File path is too long"))]
    pub file_path: Option<String>,
}

impl From<LabReport> for proto::LabReport {
    fn from(l: LabReport) -> Self {
        Self {
            id: l.id,
            patient_id: l.patient_id,
            doctor_id: l.doctor_id,
            case_study_id: l.case_study_id,
            test_name: l.test_name,
            test_date: l.test_date.to_string(),
            results: l.results,
            notes: l.notes,
            file_path: l.file_path,
            status: l.status.to_proto(),
            created_at: Some(datetime_to_timestamp(l.created_at)),
        }
    }
}
