//! Wiring: store selection, listeners, probe routes and the gRPC server.

use crate::config::{ClinicConfig, StoreBackend};
use crate::grpc::{
    proto::{clinic_service_server::ClinicServiceServer, FILE_DESCRIPTOR_SET},
    ClinicServiceImpl,
};
use crate::services::{get_metrics, init_metrics, ClinicStore, Database, InMemoryStore};
use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use service_core::error::AppError;
use service_core::grpc::trace_context_interceptor;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tonic::transport::Server as GrpcServer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

const SERVICE_NAME: &str = "clinic-service";

#[derive(Clone)]
pub struct AppState {
    pub config: ClinicConfig,
    pub store: Arc<dyn ClinicStore>,
}

#[derive(Clone)]
struct ProbeState {
    store: Arc<dyn ClinicStore>,
    backend: &'static str,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Liveness: reports the configured backend and whether it answers.
async fn health(State(probe): State<ProbeState>) -> (StatusCode, Json<HealthBody>) {
    let outcome = probe.store.health_check().await;
    if let Err(e) = &outcome {
        tracing::warn!(error = %e, store = probe.backend, "Store did not answer health probe");
    }
    let code = if outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthBody {
        status: if outcome.is_ok() { "ok" } else { "unhealthy" },
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        store: probe.backend,
        error: outcome.err().map(|e| e.kind()),
    };
    (code, Json(body))
}

/// Readiness: 200 once the store answers, 503 otherwise.
async fn ready(State(probe): State<ProbeState>) -> StatusCode {
    match probe.store.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn prometheus_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        get_metrics(),
    )
}

/// Open the configured entity store, migrating PostgreSQL when asked to.
async fn open_store(
    backend: &StoreBackend,
    run_migrations: bool,
) -> Result<Arc<dyn ClinicStore>, AppError> {
    match backend {
        StoreBackend::Postgres(database) => {
            let db = Database::new(
                &database.url,
                database.max_connections,
                database.min_connections,
            )
            .await
            .inspect_err(|e| tracing::error!(error = %e, "PostgreSQL unreachable"))?;
            if run_migrations {
                db.run_migrations()
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "Migrations failed"))?;
            }
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

async fn bind(port: u16, role: &'static str) -> Result<(TcpListener, u16), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(error = %e, %addr, role, "Bind failed");
        AppError::from(e)
    })?;
    let bound = listener.local_addr()?.port();
    Ok((listener, bound))
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    grpc_port: u16,
    http_listener: TcpListener,
    grpc_listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: ClinicConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Skips migrations; for harnesses that migrate the database themselves.
    pub async fn build_without_migrations(config: ClinicConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ClinicConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let store = open_store(&config.store, run_migrations).await?;
        let state = AppState {
            config: config.clone(),
            store,
        };

        let (http_listener, http_port) = bind(config.common.port, "http").await?;
        let (grpc_listener, grpc_port) = bind(config.common.grpc_port()?, "grpc").await?;

        tracing::info!(
            http_port = http_port,
            grpc_port = grpc_port,
            store = config.store.as_str(),
            "Clinic service listeners bound"
        );

        Ok(Self {
            http_port,
            grpc_port,
            http_listener,
            grpc_listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn grpc_port(&self) -> u16 {
        self.grpc_port
    }

    /// Get a handle to the entity store.
    pub fn store(&self) -> Arc<dyn ClinicStore> {
        self.state.store.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let probe = ProbeState {
            store: self.state.store.clone(),
            backend: self.state.config.store.as_str(),
        };

        let http_router = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(prometheus_text))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(probe);

        let clinic_service =
            ClinicServiceImpl::new(self.state.store.clone(), self.state.config.booking_policy);

        let (mut health_reporter, grpc_health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<ClinicServiceServer<ClinicServiceImpl>>()
            .await;

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()
            .map_err(|e| {
                std::io::Error::other(format!("Failed to build reflection service: {}", e))
            })?;

        let grpc_trace_layer = TraceLayer::new_for_grpc()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG));

        let clinic_service_with_interceptor =
            ClinicServiceServer::with_interceptor(clinic_service, trace_context_interceptor);

        let incoming = tokio_stream::wrappers::TcpListenerStream::new(self.grpc_listener);
        let grpc_server = GrpcServer::builder()
            .layer(grpc_trace_layer)
            .add_service(grpc_health_service)
            .add_service(reflection_service)
            .add_service(clinic_service_with_interceptor)
            .serve_with_incoming(incoming);

        tracing::info!(
            service = SERVICE_NAME,
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            grpc_port = self.grpc_port,
            booking_policy = self.state.config.booking_policy.as_str(),
            "Service ready to accept connections"
        );

        tokio::select! {
            result = axum::serve(self.http_listener, http_router) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "HTTP server error");
                    return Err(std::io::Error::other(format!("HTTP server error: {}", e)));
                }
            }
            result = grpc_server => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "gRPC server error");
                    return Err(std::io::Error::other(format!("gRPC server error: {}", e)));
                }
            }
        }

        Ok(())
    }
}
