use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub company_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub insurance_number: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewPatient {
    pub company_id: i64,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email is too long")
    )]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Phone is required"))]
    pub phone: String,
    pub date_of_birth: NaiveDate,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(max = 100, message = "Insurance number is too long"))]
    pub insurance_number: Option<String>,
    #[validate(length(max = 255, message = "Emergency contact is too long"))]
    pub emergency_contact: Option<String>,
}

impl From<Patient> for proto::Patient {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            company_id: p.company_id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone,
            date_of_birth: p.date_of_birth.to_string(),
            address: p.address,
            insurance_number: p.insurance_number,
            emergency_contact: p.emergency_contact,
            created_at: Some(datetime_to_timestamp(p.created_at)),
        }
    }
}
