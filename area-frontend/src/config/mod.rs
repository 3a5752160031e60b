use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origin the browser sees (scheme://host[:port]). Used for OAuth
    /// redirect URIs, the popup `postMessage` target and the origin header
    /// sent to the backend.
    pub public_origin: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BackendSettings {
    /// Base URL of the automation backend REST API.
    pub url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Upper bound for request bodies buffered by the `/api` proxy.
    #[serde(default = "default_max_proxy_body_bytes")]
    pub max_proxy_body_bytes: usize,
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_max_proxy_body_bytes() -> usize {
    2 * 1024 * 1024
}

#[derive(Deserialize, Clone, Debug)]
pub struct SessionSettings {
    /// Set `Secure` on the session cookie. Disable only for plain-HTTP development.
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
    /// Lifetime of a "remember me" login.
    #[serde(default = "default_remember_me_days")]
    pub remember_me_days: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secure_cookies: true,
            remember_me_days: default_remember_me_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_remember_me_days() -> i64 {
    30
}

#[derive(Deserialize, Clone, Debug)]
pub struct OAuthSettings {
    /// Delay before the callback popup closes itself.
    #[serde(default = "default_popup_close_delay_ms")]
    pub popup_close_delay_ms: u64,
    /// Google sign-in is offered only when a client id is configured.
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default = "default_google_authorize_url")]
    pub google_authorize_url: String,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            popup_close_delay_ms: default_popup_close_delay_ms(),
            google_client_id: None,
            google_authorize_url: default_google_authorize_url(),
        }
    }
}

fn default_popup_close_delay_ms() -> u64 {
    1500
}

fn default_google_authorize_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    /// Allowed `POST /login` and `POST /register` attempts per IP and window.
    #[serde(default = "default_credential_attempts")]
    pub credential_attempts: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            credential_attempts: default_credential_attempts(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_credential_attempts() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

impl Settings {
    /// Redirect URI registered with providers for a connection callback.
    pub fn connection_redirect_uri(&self, provider_slug: &str) -> String {
        format!(
            "{}/connections/{}/callback",
            self.server.public_origin.trim_end_matches('/'),
            provider_slug
        )
    }

    pub fn google_redirect_uri(&self) -> String {
        format!(
            "{}/auth/google/callback",
            self.server.public_origin.trim_end_matches('/')
        )
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("Cannot read current dir: {}", e)))?;

    // Running from the workspace root or from the crate directory.
    let configuration_directory = if base_path.ends_with("area-frontend") {
        base_path.join("config")
    } else {
        base_path.join("area-frontend").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
