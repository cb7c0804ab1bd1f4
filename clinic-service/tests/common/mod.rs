//! Common test utilities for clinic-service integration tests.
//!
//! `TestApp::spawn` runs the service on ephemeral ports over the in-memory
//! store. `TestApp::spawn_postgres` uses `TEST_DATABASE_URL` with a private
//! schema per app and returns `None` when the variable is unset.

#![allow(dead_code)]

use clinic_service::config::{ClinicConfig, DatabaseConfig, StoreBackend};
use clinic_service::grpc::proto::{
    clinic_service_client::ClinicServiceClient, Company, CreateAppointmentRequest,
    CreateCompanyRequest, CreateDepartmentRequest, CreateDoctorRequest, CreateInvoiceRequest,
    CreatePatientRequest, Department, Doctor, Invoice, Patient, PaymentMethod,
    RecordPaymentRequest, RecordPaymentResponse,
};
use clinic_service::services::BookingConflictPolicy;
use clinic_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;
use tonic::transport::Channel;
use tonic::{Response, Status};

pub type Client = ClinicServiceClient<Channel>;

static INIT: Once = Once::new();
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,clinic_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(store: StoreBackend, booking_policy: BookingConflictPolicy) -> ClinicConfig {
    ClinicConfig {
        common: CommonConfig { port: 0 },
        service_name: "clinic-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store,
        booking_policy,
    }
}

/// A running service instance.
pub struct TestApp {
    pub http_address: String,
    pub grpc_address: String,
    pub client: Client,
    schema_name: Option<String>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_policy(BookingConflictPolicy::Allow).await
    }

    pub async fn spawn_with_policy(policy: BookingConflictPolicy) -> Self {
        Self::launch(test_config(StoreBackend::Memory, policy), None).await
    }

    /// Spawn against PostgreSQL, or `None` when `TEST_DATABASE_URL` is unset.
    pub async fn spawn_postgres(policy: BookingConflictPolicy) -> Option<Self> {
        let base_url = std::env::var("TEST_DATABASE_URL").ok()?;
        let schema_name = format!(
            "test_clinic_{}_{}",
            std::process::id(),
            SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
        pool.close().await;

        let separator = if base_url.contains('?') { "&" } else { "?" };
        let url = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );
        let store = StoreBackend::Postgres(DatabaseConfig {
            url,
            max_connections: 10,
            min_connections: 1,
        });

        Some(Self::launch(test_config(store, policy), Some(schema_name)).await)
    }

    async fn launch(config: ClinicConfig, schema_name: Option<String>) -> Self {
        init_tracing();

        let app = Application::build(config)
            .await
            .expect("Failed to build application");

        let http_address = format!("http://127.0.0.1:{}", app.http_port());
        let grpc_address = format!("http://127.0.0.1:{}", app.grpc_port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for server to be ready with retry
        let client = {
            let mut attempts = 0;
            loop {
                match ClinicServiceClient::connect(grpc_address.clone()).await {
                    Ok(client) => break client,
                    Err(_) if attempts < 20 => {
                        attempts += 1;
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
                }
            }
        };

        TestApp {
            http_address,
            grpc_address,
            client,
            schema_name,
        }
    }

    /// Drop the private schema, if any.
    pub async fn cleanup(&self) {
        let (Some(schema_name), Ok(base_url)) =
            (&self.schema_name, std::env::var("TEST_DATABASE_URL"))
        else {
            return;
        };
        if let Ok(pool) = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
        {
            let _ = sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
                .execute(&pool)
                .await;
            pool.close().await;
        }
    }
}

/// The `x-error-kind` metadata attached to a failed call.
pub fn error_kind(status: &Status) -> Option<String> {
    status
        .metadata()
        .get("x-error-kind")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

// =============================================================================
// Fixtures
// =============================================================================

pub async fn create_company(client: &mut Client, name: &str) -> Company {
    client
        .create_company(CreateCompanyRequest {
            name: name.to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
            email: format!("desk@{}.example", name.to_lowercase().replace(' ', "-")),
            license_number: format!("LIC-{}", name),
        })
        .await
        .expect("Failed to create company")
        .into_inner()
        .company
        .expect("company missing from response")
}

pub async fn create_department(client: &mut Client, company_id: i64, name: &str) -> Department {
    client
        .create_department(CreateDepartmentRequest {
            company_id,
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("Failed to create department")
        .into_inner()
        .department
        .expect("department missing from response")
}

pub async fn create_doctor(client: &mut Client, company_id: i64, department_id: i64) -> Doctor {
    client
        .create_doctor(CreateDoctorRequest {
            company_id,
            department_id,
            first_name: "Gregory".to_string(),
            last_name: "House".to_string(),
            email: "house@clinic.example".to_string(),
            phone: "555-0102".to_string(),
            specialization: "Diagnostics".to_string(),
            license_number: "MD-1".to_string(),
        })
        .await
        .expect("Failed to create doctor")
        .into_inner()
        .doctor
        .expect("doctor missing from response")
}

pub async fn create_patient(client: &mut Client, company_id: i64) -> Patient {
    client
        .create_patient(CreatePatientRequest {
            company_id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: "555-0101".to_string(),
            date_of_birth: "1990-01-01".to_string(),
            address: "2 Side St".to_string(),
            insurance_number: None,
            emergency_contact: None,
        })
        .await
        .expect("Failed to create patient")
        .into_inner()
        .patient
        .expect("patient missing from response")
}

/// A company with one department, one doctor and one patient.
pub struct Clinic {
    pub company: Company,
    pub department: Department,
    pub doctor: Doctor,
    pub patient: Patient,
}

pub async fn create_clinic(client: &mut Client, name: &str) -> Clinic {
    let company = create_company(client, name).await;
    let department = create_department(client, company.id, "General").await;
    let doctor = create_doctor(client, company.id, department.id).await;
    let patient = create_patient(client, company.id).await;
    Clinic {
        company,
        department,
        doctor,
        patient,
    }
}

pub async fn try_create_invoice(
    client: &mut Client,
    patient_id: i64,
    company_id: i64,
    total_amount: &str,
) -> Result<Invoice, Status> {
    client
        .create_invoice(CreateInvoiceRequest {
            patient_id,
            company_id,
            total_amount: total_amount.to_string(),
            due_date: "2024-02-15".to_string(),
            notes: None,
        })
        .await
        .map(|r| r.into_inner().invoice.expect("invoice missing from response"))
}

pub async fn create_invoice(
    client: &mut Client,
    patient_id: i64,
    company_id: i64,
    total_amount: &str,
) -> Invoice {
    try_create_invoice(client, patient_id, company_id, total_amount)
        .await
        .expect("Failed to create invoice")
}

pub async fn record_payment(
    client: &mut Client,
    invoice_id: i64,
    amount: &str,
    method: PaymentMethod,
) -> Result<Response<RecordPaymentResponse>, Status> {
    client
        .record_payment(RecordPaymentRequest {
            invoice_id,
            amount: amount.to_string(),
            payment_method: method as i32,
            payment_date: "2024-01-20".to_string(),
            reference_number: None,
            notes: None,
        })
        .await
}

pub fn appointment_request(patient_id: i64, doctor_id: i64, time: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id,
        doctor_id,
        appointment_date: "2024-03-01".to_string(),
        appointment_time: time.to_string(),
        notes: None,
    }
}
