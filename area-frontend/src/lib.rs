pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::Settings;
use metrics_exporter_prometheus::PrometheusHandle;
use services::{AuthedClient, BackendClient, ProxyClient};
use std::sync::Arc;

/// Shared application state: settings and the backend clients.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub authed: Arc<AuthedClient>,
    pub proxy: Arc<ProxyClient>,
    /// Absent when no global recorder was installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings, metrics: Option<PrometheusHandle>) -> anyhow::Result<Self> {
        let backend = Arc::new(BackendClient::new(
            &settings.backend,
            &settings.server.public_origin,
        )?);
        let authed = Arc::new(AuthedClient::new(backend));
        let proxy = Arc::new(ProxyClient::new(authed.clone()));

        Ok(Self {
            settings: Arc::new(settings),
            authed,
            proxy,
            metrics,
        })
    }

    pub fn backend(&self) -> &BackendClient {
        self.authed.backend()
    }
}
