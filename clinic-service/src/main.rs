//! Clinic Service entry point.

use clinic_service::config::{ClinicConfig, StoreBackend};
use clinic_service::services::init_metrics;
use clinic_service::startup::Application;

use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = ClinicConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )
    .map_err(|e| std::io::Error::other(e.to_string()))?;

    tracing::info!(
        version = %config.service_version,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Starting clinic-service"
    );

    init_metrics();

    // Connection URLs are never logged.
    let (db_max_connections, db_min_connections) = match &config.store {
        StoreBackend::Postgres(db) => (db.max_connections, db.min_connections),
        StoreBackend::Memory => (0, 0),
    };
    tracing::info!(
        service_name = %config.service_name,
        http_port = %config.common.port,
        store = config.store.as_str(),
        db_max_connections = db_max_connections,
        db_min_connections = db_min_connections,
        booking_policy = config.booking_policy.as_str(),
        "Configuration loaded"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Application error");
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Graceful shutdown initiated");
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
