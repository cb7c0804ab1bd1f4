//! Tenant registry, clinical record and campaign integration tests.

mod common;

use clinic_service::grpc::proto::{
    CampaignStatus, CampaignType, CaseStudyStatus, CreateCampaignRequest, CreateCaseStudyRequest,
    CreateCompanyRequest, CreateDepartmentRequest, CreateDoctorRequest,
    CreateDoctorScheduleRequest, CreateLabReportRequest, CreatePatientRequest,
    CreatePrescriptionRequest, LabReportStatus, ListCampaignsRequest, ListCaseStudiesRequest,
    ListCompaniesRequest, ListDepartmentsRequest, ListDoctorSchedulesRequest,
    ListDoctorsRequest, ListLabReportsRequest, ListPatientsRequest, ListPrescriptionsRequest,
    SetDoctorActiveRequest,
};
use common::{
    create_clinic, create_company, create_department, create_doctor, create_patient, error_kind,
    Client, TestApp,
};
use tonic::{Code, Status};

async fn create_case_study(
    client: &mut Client,
    patient_id: i64,
    doctor_id: i64,
) -> Result<clinic_service::grpc::proto::CaseStudy, Status> {
    client
        .create_case_study(CreateCaseStudyRequest {
            patient_id,
            doctor_id,
            title: "Persistent cough".to_string(),
            diagnosis: "Bronchitis".to_string(),
            treatment_plan: "Rest and fluids".to_string(),
            notes: None,
        })
        .await
        .map(|r| r.into_inner().case_study.unwrap())
}

fn prescription_request(
    patient_id: i64,
    doctor_id: i64,
    case_study_id: Option<i64>,
) -> CreatePrescriptionRequest {
    CreatePrescriptionRequest {
        patient_id,
        doctor_id,
        case_study_id,
        medication_name: "Amoxicillin".to_string(),
        dosage: "500mg".to_string(),
        frequency: "3x daily".to_string(),
        duration: "7 days".to_string(),
        instructions: Some("Take with food".to_string()),
    }
}

#[tokio::test]
async fn test_company_and_department_registration() {
    let mut app = TestApp::spawn().await;
    let company = create_company(&mut app.client, "Northside").await;
    assert!(company.id > 0);
    assert_eq!(company.name, "Northside");
    assert!(company.created_at.is_some());

    let department = create_department(&mut app.client, company.id, "Cardiology").await;
    assert_eq!(department.company_id, company.id);

    let status = app
        .client
        .create_department(CreateDepartmentRequest {
            company_id: 9999,
            name: "Orphan".to_string(),
            description: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(error_kind(&status).as_deref(), Some("company_not_found"));

    let companies = app
        .client
        .list_companies(ListCompaniesRequest {})
        .await
        .unwrap()
        .into_inner()
        .companies;
    assert_eq!(companies.len(), 1);

    let departments = app
        .client
        .list_departments(ListDepartmentsRequest {
            company_id: Some(company.id),
        })
        .await
        .unwrap()
        .into_inner()
        .departments;
    assert_eq!(departments.len(), 1);
    assert_eq!(departments[0].name, "Cardiology");
}

#[tokio::test]
async fn test_company_validation() {
    let mut app = TestApp::spawn().await;

    let status = app
        .client
        .create_company(CreateCompanyRequest {
            name: "   ".to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
            email: "desk@northside.example".to_string(),
            license_number: "LIC-1".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(error_kind(&status).as_deref(), Some("invalid_input"));

    let status = app
        .client
        .create_company(CreateCompanyRequest {
            name: "Northside".to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
            email: "not-an-email".to_string(),
            license_number: "LIC-1".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_doctor_department_must_belong_to_company() {
    let mut app = TestApp::spawn().await;
    let north = create_company(&mut app.client, "North").await;
    let south = create_company(&mut app.client, "South").await;
    let south_dept = create_department(&mut app.client, south.id, "General").await;

    let status = app
        .client
        .create_doctor(CreateDoctorRequest {
            company_id: north.id,
            department_id: south_dept.id,
            first_name: "John".to_string(),
            last_name: "Watson".to_string(),
            email: "watson@clinic.example".to_string(),
            phone: "555-0103".to_string(),
            specialization: "General practice".to_string(),
            license_number: "MD-2".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_kind(&status).as_deref(), Some("tenant_mismatch"));

    let doctor = create_doctor(&mut app.client, south.id, south_dept.id).await;
    assert!(doctor.is_active);
    assert_eq!(doctor.department_id, south_dept.id);

    let doctors = app
        .client
        .list_doctors(ListDoctorsRequest {
            company_id: Some(north.id),
            department_id: None,
        })
        .await
        .unwrap()
        .into_inner()
        .doctors;
    assert!(doctors.is_empty());
}

#[tokio::test]
async fn test_set_doctor_active_unknown_doctor() {
    let mut app = TestApp::spawn().await;

    let status = app
        .client
        .set_doctor_active(SetDoctorActiveRequest {
            doctor_id: 9999,
            is_active: false,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(error_kind(&status).as_deref(), Some("doctor_not_found"));
}

#[tokio::test]
async fn test_patient_registration() {
    let mut app = TestApp::spawn().await;
    let north = create_company(&mut app.client, "North").await;
    let south = create_company(&mut app.client, "South").await;

    create_patient(&mut app.client, north.id).await;
    create_patient(&mut app.client, south.id).await;
    create_patient(&mut app.client, north.id).await;

    let status = app
        .client
        .create_patient(CreatePatientRequest {
            company_id: north.id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: "555-0101".to_string(),
            date_of_birth: "01/01/1990".to_string(),
            address: "2 Side St".to_string(),
            insurance_number: None,
            emergency_contact: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let patients = app
        .client
        .list_patients(ListPatientsRequest {
            company_id: Some(north.id),
        })
        .await
        .unwrap()
        .into_inner()
        .patients;
    assert_eq!(patients.len(), 2);
    assert!(patients.iter().all(|p| p.company_id == north.id));
    assert!(patients[0].id < patients[1].id);
    assert_eq!(patients[0].date_of_birth, "1990-01-01");
}

#[tokio::test]
async fn test_doctor_schedules() {
    let mut app = TestApp::spawn().await;
    let clinic = create_clinic(&mut app.client, "Northside").await;

    let schedule = app
        .client
        .create_doctor_schedule(CreateDoctorScheduleRequest {
            doctor_id: clinic.doctor.id,
            day_of_week: 1,
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .schedule
        .unwrap();
    assert_eq!(schedule.day_of_week, 1);
    assert_eq!(schedule.start_time, "09:00");
    assert_eq!(schedule.end_time, "17:00");
    assert!(schedule.is_available);

    for (day, start, end) in [(7, "09:00", "17:00"), (2, "17:00", "09:00"), (2, "9am", "5pm")] {
        let status = app
            .client
            .create_doctor_schedule(CreateDoctorScheduleRequest {
                doctor_id: clinic.doctor.id,
                day_of_week: day,
                start_time: start.to_string(),
                end_time: end.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument, "{} {}-{}", day, start, end);
    }

    let status = app
        .client
        .create_doctor_schedule(CreateDoctorScheduleRequest {
            doctor_id: 9999,
            day_of_week: 1,
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(error_kind(&status).as_deref(), Some("doctor_not_found"));

    let schedules = app
        .client
        .list_doctor_schedules(ListDoctorSchedulesRequest {
            doctor_id: clinic.doctor.id,
        })
        .await
        .unwrap()
        .into_inner()
        .schedules;
    assert_eq!(schedules.len(), 1);
}

#[tokio::test]
async fn test_clinical_records() {
    let mut app = TestApp::spawn().await;
    let clinic = create_clinic(&mut app.client, "Northside").await;

    let case_study = create_case_study(&mut app.client, clinic.patient.id, clinic.doctor.id)
        .await
        .unwrap();
    assert_eq!(case_study.status, CaseStudyStatus::Active as i32);

    let prescription = app
        .client
        .create_prescription(prescription_request(
            clinic.patient.id,
            clinic.doctor.id,
            Some(case_study.id),
        ))
        .await
        .unwrap()
        .into_inner()
        .prescription
        .unwrap();
    assert_eq!(prescription.case_study_id, Some(case_study.id));

    let report = app
        .client
        .create_lab_report(CreateLabReportRequest {
            patient_id: clinic.patient.id,
            doctor_id: clinic.doctor.id,
            case_study_id: None,
            test_name: "CBC".to_string(),
            test_date: "2024-03-02".to_string(),
            results: "Within normal range".to_string(),
            notes: None,
            file_path: Some("reports/cbc.pdf".to_string()),
        })
        .await
        .unwrap()
        .into_inner()
        .lab_report
        .unwrap();
    assert_eq!(report.status, LabReportStatus::Pending as i32);
    assert_eq!(report.test_date, "2024-03-02");
    assert_eq!(report.case_study_id, None);

    let case_studies = app
        .client
        .list_case_studies(ListCaseStudiesRequest {
            patient_id: Some(clinic.patient.id),
            doctor_id: None,
        })
        .await
        .unwrap()
        .into_inner()
        .case_studies;
    assert_eq!(case_studies.len(), 1);

    let prescriptions = app
        .client
        .list_prescriptions(ListPrescriptionsRequest {
            patient_id: None,
            doctor_id: Some(clinic.doctor.id),
        })
        .await
        .unwrap()
        .into_inner()
        .prescriptions;
    assert_eq!(prescriptions.len(), 1);

    let reports = app
        .client
        .list_lab_reports(ListLabReportsRequest {
            patient_id: Some(clinic.patient.id),
            doctor_id: Some(clinic.doctor.id),
        })
        .await
        .unwrap()
        .into_inner()
        .lab_reports;
    assert_eq!(reports.len(), 1);
}

#[tokio::test]
async fn test_clinical_record_references() {
    let mut app = TestApp::spawn().await;
    let clinic = create_clinic(&mut app.client, "Northside").await;
    let other_patient = create_patient(&mut app.client, clinic.company.id).await;

    let status = create_case_study(&mut app.client, 9999, clinic.doctor.id)
        .await
        .unwrap_err();
    assert_eq!(error_kind(&status).as_deref(), Some("patient_not_found"));

    let case_study = create_case_study(&mut app.client, clinic.patient.id, clinic.doctor.id)
        .await
        .unwrap();

    // A case study belonging to someone else cannot be attached.
    let status = app
        .client
        .create_prescription(prescription_request(
            other_patient.id,
            clinic.doctor.id,
            Some(case_study.id),
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert_eq!(error_kind(&status).as_deref(), Some("tenant_mismatch"));

    let status = app
        .client
        .create_prescription(prescription_request(
            clinic.patient.id,
            clinic.doctor.id,
            Some(9999),
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(error_kind(&status).as_deref(), Some("case_study_not_found"));

    let prescriptions = app
        .client
        .list_prescriptions(ListPrescriptionsRequest {
            patient_id: None,
            doctor_id: None,
        })
        .await
        .unwrap()
        .into_inner()
        .prescriptions;
    assert!(prescriptions.is_empty());
}

#[tokio::test]
async fn test_campaigns() {
    let mut app = TestApp::spawn().await;
    let north = create_company(&mut app.client, "North").await;
    let south = create_company(&mut app.client, "South").await;

    let campaign = app
        .client
        .create_campaign(CreateCampaignRequest {
            company_id: north.id,
            name: "Flu shots".to_string(),
            campaign_type: CampaignType::Email as i32,
            subject: Some("Flu season".to_string()),
            message: "Book your flu shot today".to_string(),
            scheduled_date: None,
        })
        .await
        .unwrap()
        .into_inner()
        .campaign
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Draft as i32);
    assert_eq!(campaign.recipient_count, 0);
    assert!(campaign.sent_date.is_none());

    let status = app
        .client
        .create_campaign(CreateCampaignRequest {
            company_id: north.id,
            name: "Reminder".to_string(),
            campaign_type: CampaignType::Unspecified as i32,
            subject: None,
            message: "See you soon".to_string(),
            scheduled_date: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = app
        .client
        .create_campaign(CreateCampaignRequest {
            company_id: 9999,
            name: "Reminder".to_string(),
            campaign_type: CampaignType::Sms as i32,
            subject: None,
            message: "See you soon".to_string(),
            scheduled_date: None,
        })
        .await
        .unwrap_err();
    assert_eq!(error_kind(&status).as_deref(), Some("company_not_found"));

    let south_campaigns = app
        .client
        .list_campaigns(ListCampaignsRequest {
            company_id: Some(south.id),
        })
        .await
        .unwrap()
        .into_inner()
        .campaigns;
    assert!(south_campaigns.is_empty());

    let north_campaigns = app
        .client
        .list_campaigns(ListCampaignsRequest {
            company_id: Some(north.id),
        })
        .await
        .unwrap()
        .into_inner()
        .campaigns;
    assert_eq!(north_campaigns.len(), 1);
    assert_eq!(north_campaigns[0].name, "Flu shots");
}

#[tokio::test]
async fn test_text_fields_bounded_by_storage() {
    let mut app = TestApp::spawn().await;
    let north = create_company(&mut app.client, "North").await;

    let patient = |insurance_number: String, emergency_contact: Option<String>| {
        CreatePatientRequest {
            company_id: north.id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: "555-0101".to_string(),
            date_of_birth: "1990-01-01".to_string(),
            address: "2 Side St".to_string(),
            insurance_number: Some(insurance_number),
            emergency_contact,
        }
    };

    let status = app
        .client
        .create_patient(patient("I".repeat(101), None))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(error_kind(&status).as_deref(), Some("invalid_input"));

    let status = app
        .client
        .create_patient(patient("INS-1".to_string(), Some("E".repeat(256))))
        .await
        .unwrap_err();
    assert_eq!(error_kind(&status).as_deref(), Some("invalid_input"));

    let patients = app
        .client
        .list_patients(ListPatientsRequest {
            company_id: Some(north.id),
        })
        .await
        .unwrap()
        .into_inner()
        .patients;
    assert!(patients.is_empty());

    app.client
        .create_patient(patient("I".repeat(100), Some("E".repeat(255))))
        .await
        .unwrap();

    let status = app
        .client
        .create_campaign(CreateCampaignRequest {
            company_id: north.id,
            name: "Flu shots".to_string(),
            campaign_type: CampaignType::Email as i32,
            subject: Some("S".repeat(256)),
            message: "Book your flu shot today".to_string(),
            scheduled_date: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(error_kind(&status).as_deref(), Some("invalid_input"));
}
