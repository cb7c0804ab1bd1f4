//! PostgreSQL entity store for clinic-service.

use crate::models::{
    paid_amount_after, Appointment, AppointmentStatus, Campaign, CampaignStatus, CaseStudy,
    CaseStudyStatus, Company, Department, Doctor, DoctorSchedule, EntityKind, Invoice,
    InvoiceStatus, LabReport, LabReportStatus, NewAppointment, NewCampaign, NewCaseStudy,
    NewCompany, NewDepartment, NewDoctor, NewDoctorSchedule, NewInvoice, NewLabReport, NewPatient,
    NewPayment, NewPrescription, Patient, Payment, Prescription,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::sequence::{format_invoice_number, reserve_invoice_sequence};
use crate::services::store::{
    AppointmentFilter, BookingConflictPolicy, BookingOutcome, CampaignFilter, ClinicStore,
    ClinicalFilter, DepartmentFilter, DoctorFilter, EntityRef, InvoiceFilter, PatientFilter,
    PaymentFilter, PaymentOutcome,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "clinic-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn lookup_query(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Company => "SELECT id, NULL::BIGINT AS owner_id FROM companies WHERE id = $1",
        EntityKind::Department => {
            "SELECT id, company_id AS owner_id FROM departments WHERE id = $1"
        }
        EntityKind::Doctor => "SELECT id, company_id AS owner_id FROM doctors WHERE id = $1",
        EntityKind::Patient => "SELECT id, company_id AS owner_id FROM patients WHERE id = $1",
        EntityKind::Appointment => {
            "SELECT id, patient_id AS owner_id FROM appointments WHERE id = $1"
        }
        EntityKind::CaseStudy => {
            "SELECT id, patient_id AS owner_id FROM case_studies WHERE id = $1"
        }
        EntityKind::Invoice => "SELECT id, company_id AS owner_id FROM invoices WHERE id = $1",
    }
}

#[async_trait]
impl ClinicStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        Database::health_check(self).await
    }

    #[instrument(skip(self), fields(kind = %kind, id = id))]
    async fn lookup(&self, kind: EntityKind, id: i64) -> Result<Option<EntityRef>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["lookup"])
            .start_timer();

        let found = sqlx::query_as::<_, EntityRef>(lookup_query(kind))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to look up {}: {}", kind, e))
            })?;

        timer.observe_duration();
        Ok(found)
    }

    // =========================================================================
    // Companies and departments
    // =========================================================================

    #[instrument(skip(self, input))]
    async fn insert_company(&self, input: &NewCompany) -> Result<Company, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_company"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, address, phone, email, license_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, address, phone, email, license_number, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.license_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create company: {}", e)))?;

        timer.observe_duration();
        info!(company_id = company.id, "Company created");

        Ok(company)
    }

    #[instrument(skip(self))]
    async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_companies"])
            .start_timer();

        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT id, name, address, phone, email, license_number, created_at, updated_at
            FROM companies
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list companies: {}", e)))?;

        timer.observe_duration();
        Ok(companies)
    }

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    async fn insert_department(&self, input: &NewDepartment) -> Result<Department, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_department"])
            .start_timer();

        let department = sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (company_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, company_id, name, description, created_at
            "#,
        )
        .bind(input.company_id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create department: {}", e))
        })?;

        timer.observe_duration();
        info!(department_id = department.id, "Department created");

        Ok(department)
    }

    #[instrument(skip(self))]
    async fn list_departments(
        &self,
        filter: &DepartmentFilter,
    ) -> Result<Vec<Department>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_departments"])
            .start_timer();

        let departments = sqlx::query_as::<_, Department>(
            r#"
            SELECT id, company_id, name, description, created_at
            FROM departments
            WHERE ($1::BIGINT IS NULL OR company_id = $1)
            ORDER BY id
            "#,
        )
        .bind(filter.company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list departments: {}", e))
        })?;

        timer.observe_duration();
        Ok(departments)
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    async fn insert_doctor(&self, input: &NewDoctor) -> Result<Doctor, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_doctor"])
            .start_timer();

        let doctor = sqlx::query_as::<_, Doctor>(
            r#"
            INSERT INTO doctors (company_id, department_id, first_name, last_name, email, phone, specialization, license_number, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
            RETURNING id, company_id, department_id, first_name, last_name, email, phone, specialization, license_number, is_active, created_at
            "#,
        )
        .bind(input.company_id)
        .bind(input.department_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.specialization)
        .bind(&input.license_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create doctor: {}", e)))?;

        timer.observe_duration();
        info!(doctor_id = doctor.id, "Doctor created");

        Ok(doctor)
    }

    #[instrument(skip(self))]
    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_doctor"])
            .start_timer();

        let doctor = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, company_id, department_id, first_name, last_name, email, phone, specialization, license_number, is_active, created_at
            FROM doctors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get doctor: {}", e)))?;

        timer.observe_duration();
        Ok(doctor)
    }

    #[instrument(skip(self))]
    async fn list_doctors(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_doctors"])
            .start_timer();

        let doctors = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, company_id, department_id, first_name, last_name, email, phone, specialization, license_number, is_active, created_at
            FROM doctors
            WHERE ($1::BIGINT IS NULL OR company_id = $1)
              AND ($2::BIGINT IS NULL OR department_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.company_id)
        .bind(filter.department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list doctors: {}", e)))?;

        timer.observe_duration();
        Ok(doctors)
    }

    #[instrument(skip(self))]
    async fn set_doctor_active(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<Option<Doctor>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_doctor_active"])
            .start_timer();

        let doctor = sqlx::query_as::<_, Doctor>(
            r#"
            UPDATE doctors SET is_active = $2
            WHERE id = $1
            RETURNING id, company_id, department_id, first_name, last_name, email, phone, specialization, license_number, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update doctor status: {}", e))
        })?;

        timer.observe_duration();
        if doctor.is_some() {
            info!(doctor_id = id, is_active = is_active, "Doctor active flag updated");
        }

        Ok(doctor)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    async fn insert_patient(&self, input: &NewPatient) -> Result<Patient, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_patient"])
            .start_timer();

        let patient = sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (company_id, first_name, last_name, email, phone, date_of_birth, address, insurance_number, emergency_contact)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, company_id, first_name, last_name, email, phone, date_of_birth, address, insurance_number, emergency_contact, created_at
            "#,
        )
        .bind(input.company_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.date_of_birth)
        .bind(&input.address)
        .bind(&input.insurance_number)
        .bind(&input.emergency_contact)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create patient: {}", e)))?;

        timer.observe_duration();
        info!(patient_id = patient.id, "Patient created");

        Ok(patient)
    }

    #[instrument(skip(self))]
    async fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<Patient>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_patients"])
            .start_timer();

        let patients = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, company_id, first_name, last_name, email, phone, date_of_birth, address, insurance_number, emergency_contact, created_at
            FROM patients
            WHERE ($1::BIGINT IS NULL OR company_id = $1)
            ORDER BY id
            "#,
        )
        .bind(filter.company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list patients: {}", e)))?;

        timer.observe_duration();
        Ok(patients)
    }

    // =========================================================================
    // Doctor schedules
    // =========================================================================

    #[instrument(skip(self, input), fields(doctor_id = input.doctor_id))]
    async fn insert_schedule(
        &self,
        input: &NewDoctorSchedule,
    ) -> Result<DoctorSchedule, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_schedule"])
            .start_timer();

        let schedule = sqlx::query_as::<_, DoctorSchedule>(
            r#"
            INSERT INTO doctor_schedules (doctor_id, day_of_week, start_time, end_time, is_available)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, doctor_id, day_of_week, start_time, end_time, is_available, created_at
            "#,
        )
        .bind(input.doctor_id)
        .bind(input.day_of_week)
        .bind(input.start_time)
        .bind(input.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create doctor schedule: {}", e))
        })?;

        timer.observe_duration();
        info!(schedule_id = schedule.id, "Doctor schedule created");

        Ok(schedule)
    }

    #[instrument(skip(self))]
    async fn list_schedules(&self, doctor_id: i64) -> Result<Vec<DoctorSchedule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_schedules"])
            .start_timer();

        let schedules = sqlx::query_as::<_, DoctorSchedule>(
            r#"
            SELECT id, doctor_id, day_of_week, start_time, end_time, is_available, created_at
            FROM doctor_schedules
            WHERE doctor_id = $1
            ORDER BY id
            "#,
        )
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list doctor schedules: {}", e))
        })?;

        timer.observe_duration();
        Ok(schedules)
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    #[instrument(skip(self, input), fields(doctor_id = input.doctor_id, patient_id = input.patient_id, policy = policy.as_str()))]
    async fn insert_appointment(
        &self,
        input: &NewAppointment,
        policy: BookingConflictPolicy,
    ) -> Result<BookingOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_appointment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if policy == BookingConflictPolicy::Reject {
            // Serialize bookings per doctor so the slot check below stays valid until commit.
            sqlx::query_scalar::<_, i64>("SELECT id FROM doctors WHERE id = $1 FOR UPDATE")
                .bind(input.doctor_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to lock doctor: {}", e))
                })?;

            let taken = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM appointments
                    WHERE doctor_id = $1
                      AND appointment_date = $2
                      AND appointment_time = $3
                      AND status <> 'cancelled'
                )
                "#,
            )
            .bind(input.doctor_id)
            .bind(input.appointment_date)
            .bind(input.appointment_time)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check slot: {}", e))
            })?;

            if taken {
                tx.rollback().await.ok();
                timer.observe_duration();
                return Ok(BookingOutcome::SlotTaken);
            }
        }

        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, appointment_date, appointment_time, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, patient_id, doctor_id, appointment_date, appointment_time, status, notes, created_at
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(input.appointment_date)
        .bind(input.appointment_time)
        .bind(AppointmentStatus::Scheduled)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create appointment: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit appointment: {}", e))
        })?;

        timer.observe_duration();
        info!(appointment_id = appointment.id, "Appointment created");

        Ok(BookingOutcome::Booked(appointment))
    }

    #[instrument(skip(self))]
    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_appointment"])
            .start_timer();

        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, patient_id, doctor_id, appointment_date, appointment_time, status, notes, created_at
            FROM appointments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get appointment: {}", e))
        })?;

        timer.observe_duration();
        Ok(appointment)
    }

    #[instrument(skip(self))]
    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_appointments"])
            .start_timer();

        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, patient_id, doctor_id, appointment_date, appointment_time, status, notes, created_at
            FROM appointments
            WHERE ($1::BIGINT IS NULL OR doctor_id = $1)
              AND ($2::BIGINT IS NULL OR patient_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.doctor_id)
        .bind(filter.patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list appointments: {}", e))
        })?;

        timer.observe_duration();
        Ok(appointments)
    }

    #[instrument(skip(self))]
    async fn update_appointment_status(
        &self,
        id: i64,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_appointment_status"])
            .start_timer();

        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, patient_id, doctor_id, appointment_date, appointment_time, status, notes, created_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to update appointment status: {}",
                e
            ))
        })?;

        timer.observe_duration();
        Ok(appointment)
    }

    // =========================================================================
    // Clinical records
    // =========================================================================

    #[instrument(skip(self, input), fields(patient_id = input.patient_id))]
    async fn insert_case_study(&self, input: &NewCaseStudy) -> Result<CaseStudy, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_case_study"])
            .start_timer();

        let case_study = sqlx::query_as::<_, CaseStudy>(
            r#"
            INSERT INTO case_studies (patient_id, doctor_id, title, diagnosis, treatment_plan, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_id, doctor_id, title, diagnosis, treatment_plan, notes, status, created_at, updated_at
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(&input.title)
        .bind(&input.diagnosis)
        .bind(&input.treatment_plan)
        .bind(&input.notes)
        .bind(CaseStudyStatus::Active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create case study: {}", e))
        })?;

        timer.observe_duration();
        info!(case_study_id = case_study.id, "Case study created");

        Ok(case_study)
    }

    #[instrument(skip(self))]
    async fn list_case_studies(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<CaseStudy>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_case_studies"])
            .start_timer();

        let case_studies = sqlx::query_as::<_, CaseStudy>(
            r#"
            SELECT id, patient_id, doctor_id, title, diagnosis, treatment_plan, notes, status, created_at, updated_at
            FROM case_studies
            WHERE ($1::BIGINT IS NULL OR patient_id = $1)
              AND ($2::BIGINT IS NULL OR doctor_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list case studies: {}", e))
        })?;

        timer.observe_duration();
        Ok(case_studies)
    }

    #[instrument(skip(self, input), fields(patient_id = input.patient_id))]
    async fn insert_prescription(
        &self,
        input: &NewPrescription,
    ) -> Result<Prescription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_prescription"])
            .start_timer();

        let prescription = sqlx::query_as::<_, Prescription>(
            r#"
            INSERT INTO prescriptions (patient_id, doctor_id, case_study_id, medication_name, dosage, frequency, duration, instructions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, patient_id, doctor_id, case_study_id, medication_name, dosage, frequency, duration, instructions, created_at
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(input.case_study_id)
        .bind(&input.medication_name)
        .bind(&input.dosage)
        .bind(&input.frequency)
        .bind(&input.duration)
        .bind(&input.instructions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create prescription: {}", e))
        })?;

        timer.observe_duration();
        info!(prescription_id = prescription.id, "Prescription created");

        Ok(prescription)
    }

    #[instrument(skip(self))]
    async fn list_prescriptions(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<Prescription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_prescriptions"])
            .start_timer();

        let prescriptions = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, patient_id, doctor_id, case_study_id, medication_name, dosage, frequency, duration, instructions, created_at
            FROM prescriptions
            WHERE ($1::BIGINT IS NULL OR patient_id = $1)
              AND ($2::BIGINT IS NULL OR doctor_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list prescriptions: {}", e))
        })?;

        timer.observe_duration();
        Ok(prescriptions)
    }

    #[instrument(skip(self, input), fields(patient_id = input.patient_id))]
    async fn insert_lab_report(&self, input: &NewLabReport) -> Result<LabReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_lab_report"])
            .start_timer();

        let report = sqlx::query_as::<_, LabReport>(
            r#"
            INSERT INTO lab_reports (patient_id, doctor_id, case_study_id, test_name, test_date, results, notes, file_path, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, patient_id, doctor_id, case_study_id, test_name, test_date, results, notes, file_path, status, created_at
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(input.case_study_id)
        .bind(&input.test_name)
        .bind(input.test_date)
        .bind(&input.results)
        .bind(&input.notes)
        .bind(&input.file_path)
        .bind(LabReportStatus::Pending)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create lab report: {}", e))
        })?;

        timer.observe_duration();
        info!(lab_report_id = report.id, "Lab report created");

        Ok(report)
    }

    #[instrument(skip(self))]
    async fn list_lab_reports(
        &self,
        filter: &ClinicalFilter,
    ) -> Result<Vec<LabReport>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_lab_reports"])
            .start_timer();

        let reports = sqlx::query_as::<_, LabReport>(
            r#"
            SELECT id, patient_id, doctor_id, case_study_id, test_name, test_date, results, notes, file_path, status, created_at
            FROM lab_reports
            WHERE ($1::BIGINT IS NULL OR patient_id = $1)
              AND ($2::BIGINT IS NULL OR doctor_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list lab reports: {}", e))
        })?;

        timer.observe_duration();
        Ok(reports)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = input.company_id, patient_id = input.patient_id))]
    async fn insert_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let sequence = reserve_invoice_sequence(&mut tx, input.company_id).await?;
        let invoice_number = format_invoice_number(input.company_id, sequence);

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            RETURNING id, patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes, created_at
            "#,
        )
        .bind(input.patient_id)
        .bind(input.company_id)
        .bind(&invoice_number)
        .bind(input.total_amount)
        .bind(InvoiceStatus::Draft)
        .bind(input.due_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists for company",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();
        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes, created_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes, created_at
            FROM invoices
            WHERE ($1::BIGINT IS NULL OR patient_id = $1)
              AND ($2::BIGINT IS NULL OR company_id = $2)
            ORDER BY id
            "#,
        )
        .bind(filter.patient_id)
        .bind(filter.company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn update_invoice_status(
        &self,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes, created_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self, input), fields(invoice_id = input.invoice_id, amount = %input.amount))]
    async fn record_payment(&self, input: &NewPayment) -> Result<PaymentOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Concurrent payments on one invoice queue here.
        let paid_so_far = sqlx::query_scalar::<_, Decimal>(
            "SELECT paid_amount FROM invoices WHERE id = $1 FOR UPDATE",
        )
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;

        let Some(paid_so_far) = paid_so_far else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(PaymentOutcome::InvoiceMissing);
        };
        if paid_amount_after(paid_so_far, input.amount).is_none() {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(PaymentOutcome::PaidAmountOverflow);
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (invoice_id, amount, payment_method, payment_date, reference_number, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, invoice_id, amount, payment_method, payment_date, reference_number, notes, created_at
            "#,
        )
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(input.payment_method)
        .bind(input.payment_date)
        .bind(&input.reference_number)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET paid_amount = paid_amount + $2
            WHERE id = $1
            RETURNING id, patient_id, company_id, invoice_number, total_amount, paid_amount, status, due_date, notes, created_at
            "#,
        )
        .bind(input.invoice_id)
        .bind(input.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to apply payment to invoice: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        timer.observe_duration();
        info!(
            payment_id = payment.id,
            invoice_id = invoice.id,
            paid_amount = %invoice.paid_amount,
            "Payment recorded"
        );

        Ok(PaymentOutcome::Applied { payment, invoice })
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, invoice_id, amount, payment_method, payment_date, reference_number, notes, created_at
            FROM payments
            WHERE ($1::BIGINT IS NULL OR invoice_id = $1)
            ORDER BY id
            "#,
        )
        .bind(filter.invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();
        Ok(payments)
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = input.company_id))]
    async fn insert_campaign(&self, input: &NewCampaign) -> Result<Campaign, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_campaign"])
            .start_timer();

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (company_id, name, campaign_type, subject, message, status, scheduled_date, recipient_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
            RETURNING id, company_id, name, campaign_type, subject, message, status, scheduled_date, sent_date, recipient_count, created_at
            "#,
        )
        .bind(input.company_id)
        .bind(&input.name)
        .bind(input.campaign_type)
        .bind(&input.subject)
        .bind(&input.message)
        .bind(CampaignStatus::Draft)
        .bind(input.scheduled_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create campaign: {}", e)))?;

        timer.observe_duration();
        info!(campaign_id = campaign.id, "Campaign created");

        Ok(campaign)
    }

    #[instrument(skip(self))]
    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_campaigns"])
            .start_timer();

        let campaigns = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, company_id, name, campaign_type, subject, message, status, scheduled_date, sent_date, recipient_count, created_at
            FROM campaigns
            WHERE ($1::BIGINT IS NULL OR company_id = $1)
            ORDER BY id
            "#,
        )
        .bind(filter.company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list campaigns: {}", e)))?;

        timer.observe_duration();
        Ok(campaigns)
    }
}
