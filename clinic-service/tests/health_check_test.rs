//! Health check integration tests for clinic-service.

mod common;

use common::{create_clinic, create_invoice, TestApp};
use reqwest::Client;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/health", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "clinic-service");
    assert_eq!(body["store"], "memory");

    app.cleanup().await;
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/ready", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    app.cleanup().await;
}

#[tokio::test]
async fn metrics_endpoint_works() {
    let mut app = TestApp::spawn().await;
    let clinic = create_clinic(&mut app.client, "Metrics Clinic").await;
    create_invoice(&mut app.client, clinic.patient.id, clinic.company.id, "12.50").await;

    let client = Client::new();
    let response = client
        .get(&format!("{}/metrics", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap_or("").contains("text/plain"))
        .unwrap_or(false));

    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("clinic_invoices_created_total"));
    assert!(body.contains("clinic_grpc_requests_total"));

    app.cleanup().await;
}

#[tokio::test]
async fn grpc_health_reports_serving() {
    let app = TestApp::spawn().await;

    let channel = tonic::transport::Channel::from_shared(app.grpc_address.clone())
        .expect("valid address")
        .connect()
        .await
        .expect("Failed to connect");
    let mut health = tonic_health::pb::health_client::HealthClient::new(channel);

    let response = health
        .check(tonic_health::pb::HealthCheckRequest {
            service: "clinic.v1.ClinicService".to_string(),
        })
        .await
        .expect("Health check failed")
        .into_inner();

    assert_eq!(
        response.status,
        tonic_health::pb::health_check_response::ServingStatus::Serving as i32
    );

    app.cleanup().await;
}
