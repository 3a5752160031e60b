use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global `metrics` recorder and return the handle that renders
/// the Prometheus text format for a `/metrics` endpoint.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))
}
