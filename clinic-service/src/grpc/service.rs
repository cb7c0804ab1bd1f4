//! ClinicService gRPC implementation.

use crate::error::ClinicError;
use crate::grpc::proto::{
    clinic_service_server::ClinicService, CreateAppointmentRequest, CreateAppointmentResponse,
    CreateCampaignRequest, CreateCampaignResponse, CreateCaseStudyRequest,
    CreateCaseStudyResponse, CreateCompanyRequest, CreateCompanyResponse,
    CreateDepartmentRequest, CreateDepartmentResponse, CreateDoctorRequest, CreateDoctorResponse,
    CreateDoctorScheduleRequest, CreateDoctorScheduleResponse, CreateInvoiceRequest,
    CreateInvoiceResponse, CreateLabReportRequest, CreateLabReportResponse, CreatePatientRequest,
    CreatePatientResponse, CreatePrescriptionRequest, CreatePrescriptionResponse,
    GetInvoiceRequest, GetInvoiceResponse, ListAppointmentsRequest, ListAppointmentsResponse,
    ListCampaignsRequest, ListCampaignsResponse, ListCaseStudiesRequest, ListCaseStudiesResponse,
    ListCompaniesRequest, ListCompaniesResponse, ListDepartmentsRequest,
    ListDepartmentsResponse, ListDoctorSchedulesRequest, ListDoctorSchedulesResponse,
    ListDoctorsRequest, ListDoctorsResponse, ListInvoicesRequest, ListInvoicesResponse,
    ListLabReportsRequest, ListLabReportsResponse, ListPatientsRequest, ListPatientsResponse,
    ListPaymentsRequest, ListPaymentsResponse, ListPrescriptionsRequest,
    ListPrescriptionsResponse, RecordPaymentRequest, RecordPaymentResponse,
    SetDoctorActiveRequest, SetDoctorActiveResponse, UpdateAppointmentStatusRequest,
    UpdateAppointmentStatusResponse, UpdateInvoiceStatusRequest, UpdateInvoiceStatusResponse,
};
use crate::models::{
    non_blank, parse_amount, parse_date, parse_time_of_day, timestamp_to_datetime,
    AppointmentStatus, CampaignType, InvoiceStatus, NewAppointment, NewCampaign, NewCaseStudy,
    NewCompany, NewDepartment, NewDoctor, NewDoctorSchedule, NewInvoice, NewLabReport,
    NewPatient, NewPayment, NewPrescription, PaymentMethod,
};
use crate::services::metrics::{record_error, record_grpc_request, record_grpc_request_duration};
use crate::services::store::{
    AppointmentFilter, BookingConflictPolicy, CampaignFilter, ClinicStore, ClinicalFilter,
    DepartmentFilter, DoctorFilter, InvoiceFilter, PatientFilter, PaymentFilter,
};
use crate::services::{BookingEngine, LedgerEngine, QueryFacade, Registry};
use service_core::grpc::extract_request_id;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};
use tracing::field::Empty;
use tracing::{instrument, warn, Span};

/// ClinicService implementation.
pub struct ClinicServiceImpl {
    registry: Registry,
    ledger: LedgerEngine,
    booking: BookingEngine,
    query: QueryFacade,
}

impl ClinicServiceImpl {
    pub fn new(store: Arc<dyn ClinicStore>, policy: BookingConflictPolicy) -> Self {
        Self {
            registry: Registry::new(store.clone()),
            ledger: LedgerEngine::new(store.clone()),
            booking: BookingEngine::new(store.clone(), policy),
            query: QueryFacade::new(store),
        }
    }
}

/// Record the caller's request id on the current span.
fn trace_request<T>(request: &Request<T>) {
    if let Some(request_id) = extract_request_id(request) {
        Span::current().record("request_id", request_id.as_str());
    }
}

fn status_label(err: &ClinicError) -> &'static str {
    match err {
        ClinicError::NotFound { .. } => "not_found",
        ClinicError::InvalidAmount(_) | ClinicError::InvalidInput(_) => "invalid_argument",
        ClinicError::SlotConflict { .. } => "already_exists",
        ClinicError::OwnershipMismatch { .. }
        | ClinicError::InactivePractitioner(_)
        | ClinicError::InvalidTransition { .. } => "failed_precondition",
        ClinicError::Store(_) => "error",
    }
}

/// Record metrics for a finished call and convert its outcome.
fn respond<T>(
    method: &'static str,
    started: Instant,
    result: Result<T, ClinicError>,
) -> Result<Response<T>, Status> {
    record_grpc_request_duration(method, started.elapsed().as_secs_f64());
    match result {
        Ok(body) => {
            record_grpc_request(method, "ok");
            Ok(Response::new(body))
        }
        Err(err) => {
            record_grpc_request(method, status_label(&err));
            record_error(err.kind());
            // Store failures are logged when converted to a Status.
            if !matches!(err, ClinicError::Store(_)) {
                warn!(error = %err, kind = err.kind(), "Request rejected");
            }
            Err(err.into())
        }
    }
}

fn text(value: String) -> String {
    value.trim().to_string()
}

fn appointment_status(value: i32) -> Result<AppointmentStatus, ClinicError> {
    AppointmentStatus::from_proto(value)
        .ok_or_else(|| ClinicError::invalid_input("status must be a known appointment status"))
}

fn invoice_status(value: i32) -> Result<InvoiceStatus, ClinicError> {
    InvoiceStatus::from_proto(value)
        .ok_or_else(|| ClinicError::invalid_input("status must be a known invoice status"))
}

fn day_of_week(value: i32) -> Result<i16, ClinicError> {
    i16::try_from(value)
        .ok()
        .filter(|day| (0..=6).contains(day))
        .ok_or_else(|| ClinicError::invalid_input("day_of_week must be between 0 and 6"))
}

#[tonic::async_trait]
impl ClinicService for ClinicServiceImpl {
    // =========================================================================
    // Companies and departments
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateCompany", request_id = Empty)
    )]
    async fn create_company(
        &self,
        request: Request<CreateCompanyRequest>,
    ) -> Result<Response<CreateCompanyResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let company = self
                .registry
                .create_company(NewCompany {
                    name: text(req.name),
                    address: text(req.address),
                    phone: text(req.phone),
                    email: text(req.email),
                    license_number: text(req.license_number),
                })
                .await?;
            Ok::<_, ClinicError>(CreateCompanyResponse {
                company: Some(company.into()),
            })
        }
        .await;

        respond("CreateCompany", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListCompanies", request_id = Empty)
    )]
    async fn list_companies(
        &self,
        request: Request<ListCompaniesRequest>,
    ) -> Result<Response<ListCompaniesResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);

        let result = self.query.list_companies().await.map(|companies| {
            ListCompaniesResponse {
                companies: companies.into_iter().map(Into::into).collect(),
            }
        });

        respond("ListCompanies", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateDepartment", request_id = Empty)
    )]
    async fn create_department(
        &self,
        request: Request<CreateDepartmentRequest>,
    ) -> Result<Response<CreateDepartmentResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .registry
            .create_department(NewDepartment {
                company_id: req.company_id,
                name: text(req.name),
                description: non_blank(req.description),
            })
            .await
            .map(|department| CreateDepartmentResponse {
                department: Some(department.into()),
            });

        respond("CreateDepartment", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListDepartments", request_id = Empty)
    )]
    async fn list_departments(
        &self,
        request: Request<ListDepartmentsRequest>,
    ) -> Result<Response<ListDepartmentsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_departments(DepartmentFilter {
                company_id: req.company_id,
            })
            .await
            .map(|departments| ListDepartmentsResponse {
                departments: departments.into_iter().map(Into::into).collect(),
            });

        respond("ListDepartments", started, result)
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateDoctor", request_id = Empty)
    )]
    async fn create_doctor(
        &self,
        request: Request<CreateDoctorRequest>,
    ) -> Result<Response<CreateDoctorResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .registry
            .create_doctor(NewDoctor {
                company_id: req.company_id,
                department_id: req.department_id,
                first_name: text(req.first_name),
                last_name: text(req.last_name),
                email: text(req.email),
                phone: text(req.phone),
                specialization: text(req.specialization),
                license_number: text(req.license_number),
            })
            .await
            .map(|doctor| CreateDoctorResponse {
                doctor: Some(doctor.into()),
            });

        respond("CreateDoctor", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListDoctors", request_id = Empty)
    )]
    async fn list_doctors(
        &self,
        request: Request<ListDoctorsRequest>,
    ) -> Result<Response<ListDoctorsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_doctors(DoctorFilter {
                company_id: req.company_id,
                department_id: req.department_id,
            })
            .await
            .map(|doctors| ListDoctorsResponse {
                doctors: doctors.into_iter().map(Into::into).collect(),
            });

        respond("ListDoctors", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "SetDoctorActive", request_id = Empty)
    )]
    async fn set_doctor_active(
        &self,
        request: Request<SetDoctorActiveRequest>,
    ) -> Result<Response<SetDoctorActiveResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .registry
            .set_doctor_active(req.doctor_id, req.is_active)
            .await
            .map(|doctor| SetDoctorActiveResponse {
                doctor: Some(doctor.into()),
            });

        respond("SetDoctorActive", started, result)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreatePatient", request_id = Empty)
    )]
    async fn create_patient(
        &self,
        request: Request<CreatePatientRequest>,
    ) -> Result<Response<CreatePatientResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewPatient {
                company_id: req.company_id,
                first_name: text(req.first_name),
                last_name: text(req.last_name),
                email: non_blank(req.email),
                phone: text(req.phone),
                date_of_birth: parse_date("date_of_birth", &req.date_of_birth)?,
                address: text(req.address),
                insurance_number: non_blank(req.insurance_number),
                emergency_contact: non_blank(req.emergency_contact),
            };
            let patient = self.registry.create_patient(input).await?;
            Ok::<_, ClinicError>(CreatePatientResponse {
                patient: Some(patient.into()),
            })
        }
        .await;

        respond("CreatePatient", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListPatients", request_id = Empty)
    )]
    async fn list_patients(
        &self,
        request: Request<ListPatientsRequest>,
    ) -> Result<Response<ListPatientsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_patients(PatientFilter {
                company_id: req.company_id,
            })
            .await
            .map(|patients| ListPatientsResponse {
                patients: patients.into_iter().map(Into::into).collect(),
            });

        respond("ListPatients", started, result)
    }

    // =========================================================================
    // Doctor schedules
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateDoctorSchedule", request_id = Empty)
    )]
    async fn create_doctor_schedule(
        &self,
        request: Request<CreateDoctorScheduleRequest>,
    ) -> Result<Response<CreateDoctorScheduleResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewDoctorSchedule {
                doctor_id: req.doctor_id,
                day_of_week: day_of_week(req.day_of_week)?,
                start_time: parse_time_of_day("start_time", &req.start_time)?,
                end_time: parse_time_of_day("end_time", &req.end_time)?,
            };
            let schedule = self.registry.create_schedule(input).await?;
            Ok::<_, ClinicError>(CreateDoctorScheduleResponse {
                schedule: Some(schedule.into()),
            })
        }
        .await;

        respond("CreateDoctorSchedule", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListDoctorSchedules", request_id = Empty)
    )]
    async fn list_doctor_schedules(
        &self,
        request: Request<ListDoctorSchedulesRequest>,
    ) -> Result<Response<ListDoctorSchedulesResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_schedules(req.doctor_id)
            .await
            .map(|schedules| ListDoctorSchedulesResponse {
                schedules: schedules.into_iter().map(Into::into).collect(),
            });

        respond("ListDoctorSchedules", started, result)
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateAppointment", request_id = Empty)
    )]
    async fn create_appointment(
        &self,
        request: Request<CreateAppointmentRequest>,
    ) -> Result<Response<CreateAppointmentResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            // Format errors surface before any store access.
            let input = NewAppointment {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
                appointment_date: parse_date("appointment_date", &req.appointment_date)?,
                appointment_time: parse_time_of_day("appointment_time", &req.appointment_time)?,
                notes: non_blank(req.notes),
            };
            let appointment = self.booking.create_appointment(input).await?;
            Ok::<_, ClinicError>(CreateAppointmentResponse {
                appointment: Some(appointment.into()),
            })
        }
        .await;

        respond("CreateAppointment", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListAppointments", request_id = Empty)
    )]
    async fn list_appointments(
        &self,
        request: Request<ListAppointmentsRequest>,
    ) -> Result<Response<ListAppointmentsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_appointments(AppointmentFilter {
                doctor_id: req.doctor_id,
                patient_id: req.patient_id,
            })
            .await
            .map(|appointments| ListAppointmentsResponse {
                appointments: appointments.into_iter().map(Into::into).collect(),
            });

        respond("ListAppointments", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "UpdateAppointmentStatus", request_id = Empty)
    )]
    async fn update_appointment_status(
        &self,
        request: Request<UpdateAppointmentStatusRequest>,
    ) -> Result<Response<UpdateAppointmentStatusResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let status = appointment_status(req.status)?;
            let appointment = self
                .booking
                .update_appointment_status(req.appointment_id, status)
                .await?;
            Ok::<_, ClinicError>(UpdateAppointmentStatusResponse {
                appointment: Some(appointment.into()),
            })
        }
        .await;

        respond("UpdateAppointmentStatus", started, result)
    }

    // =========================================================================
    // Clinical records
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateCaseStudy", request_id = Empty)
    )]
    async fn create_case_study(
        &self,
        request: Request<CreateCaseStudyRequest>,
    ) -> Result<Response<CreateCaseStudyResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .registry
            .create_case_study(NewCaseStudy {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
                title: text(req.title),
                diagnosis: text(req.diagnosis),
                treatment_plan: text(req.treatment_plan),
                notes: non_blank(req.notes),
            })
            .await
            .map(|case_study| CreateCaseStudyResponse {
                case_study: Some(case_study.into()),
            });

        respond("CreateCaseStudy", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListCaseStudies", request_id = Empty)
    )]
    async fn list_case_studies(
        &self,
        request: Request<ListCaseStudiesRequest>,
    ) -> Result<Response<ListCaseStudiesResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_case_studies(ClinicalFilter {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
            })
            .await
            .map(|case_studies| ListCaseStudiesResponse {
                case_studies: case_studies.into_iter().map(Into::into).collect(),
            });

        respond("ListCaseStudies", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreatePrescription", request_id = Empty)
    )]
    async fn create_prescription(
        &self,
        request: Request<CreatePrescriptionRequest>,
    ) -> Result<Response<CreatePrescriptionResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .registry
            .create_prescription(NewPrescription {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
                case_study_id: req.case_study_id,
                medication_name: text(req.medication_name),
                dosage: text(req.dosage),
                frequency: text(req.frequency),
                duration: text(req.duration),
                instructions: non_blank(req.instructions),
            })
            .await
            .map(|prescription| CreatePrescriptionResponse {
                prescription: Some(prescription.into()),
            });

        respond("CreatePrescription", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListPrescriptions", request_id = Empty)
    )]
    async fn list_prescriptions(
        &self,
        request: Request<ListPrescriptionsRequest>,
    ) -> Result<Response<ListPrescriptionsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_prescriptions(ClinicalFilter {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
            })
            .await
            .map(|prescriptions| ListPrescriptionsResponse {
                prescriptions: prescriptions.into_iter().map(Into::into).collect(),
            });

        respond("ListPrescriptions", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateLabReport", request_id = Empty)
    )]
    async fn create_lab_report(
        &self,
        request: Request<CreateLabReportRequest>,
    ) -> Result<Response<CreateLabReportResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewLabReport {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
                case_study_id: req.case_study_id,
                test_name: text(req.test_name),
                test_date: parse_date("test_date", &req.test_date)?,
                results: text(req.results),
                notes: non_blank(req.notes),
                file_path: non_blank(req.file_path),
            };
            let report = self.registry.create_lab_report(input).await?;
            Ok::<_, ClinicError>(CreateLabReportResponse {
                lab_report: Some(report.into()),
            })
        }
        .await;

        respond("CreateLabReport", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListLabReports", request_id = Empty)
    )]
    async fn list_lab_reports(
        &self,
        request: Request<ListLabReportsRequest>,
    ) -> Result<Response<ListLabReportsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_lab_reports(ClinicalFilter {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
            })
            .await
            .map(|reports| ListLabReportsResponse {
                lab_reports: reports.into_iter().map(Into::into).collect(),
            });

        respond("ListLabReports", started, result)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateInvoice", request_id = Empty)
    )]
    async fn create_invoice(
        &self,
        request: Request<CreateInvoiceRequest>,
    ) -> Result<Response<CreateInvoiceResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewInvoice {
                patient_id: req.patient_id,
                company_id: req.company_id,
                total_amount: parse_amount("total_amount", &req.total_amount)?,
                due_date: parse_date("due_date", &req.due_date)?,
                notes: non_blank(req.notes),
            };
            let invoice = self.ledger.create_invoice(input).await?;
            Ok::<_, ClinicError>(CreateInvoiceResponse {
                invoice: Some(invoice.into()),
            })
        }
        .await;

        respond("CreateInvoice", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "GetInvoice", request_id = Empty)
    )]
    async fn get_invoice(
        &self,
        request: Request<GetInvoiceRequest>,
    ) -> Result<Response<GetInvoiceResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .ledger
            .get_invoice(req.invoice_id)
            .await
            .map(|invoice| GetInvoiceResponse {
                invoice: Some(invoice.into()),
            });

        respond("GetInvoice", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListInvoices", request_id = Empty)
    )]
    async fn list_invoices(
        &self,
        request: Request<ListInvoicesRequest>,
    ) -> Result<Response<ListInvoicesResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_invoices(InvoiceFilter {
                patient_id: req.patient_id,
                company_id: req.company_id,
            })
            .await
            .map(|invoices| ListInvoicesResponse {
                invoices: invoices.into_iter().map(Into::into).collect(),
            });

        respond("ListInvoices", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "UpdateInvoiceStatus", request_id = Empty)
    )]
    async fn update_invoice_status(
        &self,
        request: Request<UpdateInvoiceStatusRequest>,
    ) -> Result<Response<UpdateInvoiceStatusResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let status = invoice_status(req.status)?;
            let invoice = self
                .ledger
                .update_invoice_status(req.invoice_id, status)
                .await?;
            Ok::<_, ClinicError>(UpdateInvoiceStatusResponse {
                invoice: Some(invoice.into()),
            })
        }
        .await;

        respond("UpdateInvoiceStatus", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "RecordPayment", request_id = Empty)
    )]
    async fn record_payment(
        &self,
        request: Request<RecordPaymentRequest>,
    ) -> Result<Response<RecordPaymentResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewPayment {
                invoice_id: req.invoice_id,
                amount: parse_amount("amount", &req.amount)?,
                payment_method: PaymentMethod::from_proto(req.payment_method).ok_or_else(
                    || ClinicError::invalid_input("payment_method must be a known method"),
                )?,
                payment_date: parse_date("payment_date", &req.payment_date)?,
                reference_number: non_blank(req.reference_number),
                notes: non_blank(req.notes),
            };
            let (payment, invoice) = self.ledger.record_payment(input).await?;
            Ok::<_, ClinicError>(RecordPaymentResponse {
                payment: Some(payment.into()),
                invoice: Some(invoice.into()),
            })
        }
        .await;

        respond("RecordPayment", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListPayments", request_id = Empty)
    )]
    async fn list_payments(
        &self,
        request: Request<ListPaymentsRequest>,
    ) -> Result<Response<ListPaymentsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_payments(PaymentFilter {
                invoice_id: req.invoice_id,
            })
            .await
            .map(|payments| ListPaymentsResponse {
                payments: payments.into_iter().map(Into::into).collect(),
            });

        respond("ListPayments", started, result)
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "CreateCampaign", request_id = Empty)
    )]
    async fn create_campaign(
        &self,
        request: Request<CreateCampaignRequest>,
    ) -> Result<Response<CreateCampaignResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = async {
            let input = NewCampaign {
                company_id: req.company_id,
                name: text(req.name),
                campaign_type: CampaignType::from_proto(req.campaign_type).ok_or_else(|| {
                    ClinicError::invalid_input("campaign_type must be email or sms")
                })?,
                subject: non_blank(req.subject),
                message: text(req.message),
                scheduled_date: req
                    .scheduled_date
                    .as_ref()
                    .map(timestamp_to_datetime)
                    .transpose()?,
            };
            let campaign = self.registry.create_campaign(input).await?;
            Ok::<_, ClinicError>(CreateCampaignResponse {
                campaign: Some(campaign.into()),
            })
        }
        .await;

        respond("CreateCampaign", started, result)
    }

    #[instrument(
        skip(self, request),
        fields(service = "clinic-service", method = "ListCampaigns", request_id = Empty)
    )]
    async fn list_campaigns(
        &self,
        request: Request<ListCampaignsRequest>,
    ) -> Result<Response<ListCampaignsResponse>, Status> {
        let started = Instant::now();
        trace_request(&request);
        let req = request.into_inner();

        let result = self
            .query
            .list_campaigns(CampaignFilter {
                company_id: req.company_id,
            })
            .await
            .map(|campaigns| ListCampaignsResponse {
                campaigns: campaigns.into_iter().map(Into::into).collect(),
            });

        respond("ListCampaigns", started, result)
    }
}
