//! Tenant root (companies) and departments.

use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A clinic. Every other record is scoped beneath one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub license_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewCompany {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, max = 50, message = "Phone is required"))]
    pub phone: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email is too long")
    )]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "License number is required"))]
    pub license_number: String,
}

impl From<Company> for proto::Company {
    fn from(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
            address: c.address,
            phone: c.phone,
            email: c.email,
            license_number: c.license_number,
            created_at: Some(datetime_to_timestamp(c.created_at)),
            updated_at: Some(datetime_to_timestamp(c.updated_at)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewDepartment {
    pub company_id: i64,
    #[validate(length(min = 1, max = 255, message = "Department name is required"))]
    pub name: String,
    pub description: Option<String>,
}

impl From<Department> for proto::Department {
    fn from(d: Department) -> Self {
        Self {
            id: d.id,
            company_id: d.company_id,
            name: d.name,
            description: d.description,
            created_at: Some(datetime_to_timestamp(d.created_at)),
        }
    }
}
