//! Appointments and their status lifecycle.

use super::{datetime_to_timestamp, format_time_of_day};
use crate::grpc::proto;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Appointment status.
///
/// ```text
/// scheduled -> confirmed -> in_progress -> completed
///     |            |             |
///     +------------+-------------+-------> cancelled
/// ```
/// A scheduled appointment may also start directly (walk-in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::AppointmentStatus::try_from(value).ok()? {
            proto::AppointmentStatus::Unspecified => None,
            proto::AppointmentStatus::Scheduled => Some(Self::Scheduled),
            proto::AppointmentStatus::Confirmed => Some(Self::Confirmed),
            proto::AppointmentStatus::InProgress => Some(Self::InProgress),
            proto::AppointmentStatus::Completed => Some(Self::Completed),
            proto::AppointmentStatus::Cancelled => Some(Self::Cancelled),
        }
    }

    pub fn to_proto(self) -> i32 {
        let status = match self {
            Self::Scheduled => proto::AppointmentStatus::Scheduled,
            Self::Confirmed => proto::AppointmentStatus::Confirmed,
            Self::InProgress => proto::AppointmentStatus::InProgress,
            Self::Completed => proto::AppointmentStatus::Completed,
            Self::Cancelled => proto::AppointmentStatus::Cancelled,
        };
        status as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses reachable in one step from this one.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[Confirmed, InProgress, Cancelled],
            Confirmed => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A booking request whose time has already been parsed from `HH:MM`.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub notes: Option<String>,
}

impl From<Appointment> for proto::Appointment {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            patient_id: a.patient_id,
            doctor_id: a.doctor_id,
            appointment_date: a.appointment_date.to_string(),
            appointment_time: format_time_of_day(a.appointment_time),
            status: a.status.to_proto(),
            notes: a.notes,
            created_at: Some(datetime_to_timestamp(a.created_at)),
        }
    }
}
