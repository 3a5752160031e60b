use area_frontend::config::get_configuration;
use area_frontend::startup::build_router;
use area_frontend::AppState;
use dotenvy::dotenv;
use service_core::observability::{init_tracing, install_prometheus_recorder};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "area-frontend",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = install_prometheus_recorder()?;

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let backend_url = configuration.backend.url.clone();

    let state = AppState::new(configuration, Some(metrics_handle))?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(backend = %backend_url, "Starting area-frontend on {}", address);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
