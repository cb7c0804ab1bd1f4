//! Doctors and their weekly availability.

use super::{datetime_to_timestamp, format_time_of_day};
use crate::grpc::proto;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// A practitioner. Only active doctors can be booked.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub company_id: i64,
    pub department_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub license_number: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewDoctor {
    pub company_id: i64,
    pub department_id: i64,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email is too long")
    )]
    pub email: String,
    #[validate(length(min = 1, max = 50, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, max = 255, message = "Specialization is required"))]
    pub specialization: String,
    #[validate(length(min = 1, max = 100, message = "License number is required"))]
    pub license_number: String,
}

impl From<Doctor> for proto::Doctor {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id,
            company_id: d.company_id,
            department_id: d.department_id,
            first_name: d.first_name,
            last_name: d.last_name,
            email: d.email,
            phone: d.phone,
            specialization: d.specialization,
            license_number: d.license_number,
            is_active: d.is_active,
            created_at: Some(datetime_to_timestamp(d.created_at)),
        }
    }
}

/// A recurring weekly availability window. `day_of_week` is 0 (Sunday) to 6.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct NewDoctorSchedule {
    pub doctor_id: i64,
    #[validate(range(min = 0, max = 6, message = "day_of_week must be between 0 and 6"))]
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

fn validate_window(schedule: &NewDoctorSchedule) -> Result<(), ValidationError> {
    if schedule.start_time >= schedule.end_time {
        let mut err = ValidationError::new("window");
        err.message = Some("start_time must be before end_time".into());
        return Err(err);
    }
    Ok(())
}

impl From<DoctorSchedule> for proto::DoctorSchedule {
    fn from(s: DoctorSchedule) -> Self {
        Self {
            id: s.id,
            doctor_id: s.doctor_id,
            day_of_week: s.day_of_week as i32,
            start_time: format_time_of_day(s.start_time),
            end_time: format_time_of_day(s.end_time),
            is_available: s.is_available,
            created_at: Some(datetime_to_timestamp(s.created_at)),
        }
    }
}
