use axum::http::StatusCode;
use service_core::error::AppError;

/// Coarse classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session could not be (re)authenticated.
    Unauthorized,
    /// The backend rejected the request (4xx other than 401).
    Client,
    /// The backend failed (5xx).
    Server,
    /// The backend could not be reached or answered with garbage.
    Network,
    /// Local failure, e.g. the session store.
    Internal,
}

/// Error raised by calls to the automation backend: a message for the user
/// plus whatever payload the backend attached.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<StatusCode>,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            status: Some(StatusCode::UNAUTHORIZED),
            message: message.into(),
            payload: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            status: None,
            message: message.into(),
            payload: None,
        }
    }

    /// Build an error from a non-success status and the raw response body.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let payload: Option<serde_json::Value> = serde_json::from_slice(body).ok();

        let message = payload
            .as_ref()
            .and_then(|p| {
                ["message", "error"]
                    .iter()
                    .find_map(|key| p.get(*key).and_then(|v| v.as_str()))
            })
            .map(str::to_string)
            .or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                (payload.is_none() && !text.is_empty() && text.len() <= 200).then_some(text)
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        let kind = if status == StatusCode::UNAUTHORIZED {
            ErrorKind::Unauthorized
        } else if status.is_client_error() {
            ErrorKind::Client
        } else {
            ErrorKind::Server
        };

        Self {
            kind,
            status: Some(status),
            message,
            payload,
        }
    }

    /// Turn a non-success response into an error, consuming its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        match response.bytes().await {
            Ok(body) => Self::from_status(status, &body),
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Failed to read error body");
                Self::from_status(status, &[])
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// Text suitable for an alert banner.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "The automation service is unreachable. Please try again shortly.".to_string()
            }
            ErrorKind::Server => format!("The automation service failed: {}", self.message),
            ErrorKind::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            ErrorKind::Internal => "Something went wrong on our side.".to_string(),
            ErrorKind::Client => self.message.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::network(format!("Invalid response from backend: {}", err))
        } else {
            ApiError::network(format!("Backend unreachable: {}", err))
        }
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ApiError::internal(format!("Session store error: {}", err))
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ErrorKind::Unauthorized => AppError::Unauthorized(anyhow::anyhow!(err.message)),
            ErrorKind::Client => AppError::Upstream(
                err.status.unwrap_or(StatusCode::BAD_REQUEST),
                err.message,
                err.payload,
            ),
            ErrorKind::Server | ErrorKind::Network => AppError::BadGateway(err.message),
            ErrorKind::Internal => AppError::InternalError(anyhow::anyhow!(err.message)),
        }
    }
}
