//! CSRF state for OAuth round trips and the popup result handed back to the
//! opener window.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

/// `type` field of the popup message; the opener ignores anything else.
pub const POPUP_MESSAGE_TYPE: &str = "area-oauth";

/// A fresh, unguessable state value (32 random bytes, URL-safe).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn state_key(flow: &str) -> String {
    format!("oauth_state:{}", flow)
}

/// Constant-time comparison; a missing side never matches.
pub fn states_match(stored: Option<&str>, returned: Option<&str>) -> bool {
    match (stored, returned) {
        (Some(stored), Some(returned)) if !stored.is_empty() => {
            stored.as_bytes().ct_eq(returned.as_bytes()).into()
        }
        _ => false,
    }
}

/// Generate a state for `flow` and remember it in the session, replacing any
/// earlier attempt of the same flow.
pub async fn issue_state(
    session: &Session,
    flow: &str,
) -> Result<String, tower_sessions::session::Error> {
    let state = generate_state();
    session.insert(&state_key(flow), &state).await?;
    Ok(state)
}

/// Take the stored state for `flow` out of the session and compare it with
/// the one the provider echoed back. The stored value is discarded whether
/// or not it matches.
pub async fn consume_state(
    session: &Session,
    flow: &str,
    returned: Option<&str>,
) -> Result<bool, tower_sessions::session::Error> {
    let stored: Option<String> = session.remove(&state_key(flow)).await?;
    Ok(states_match(stored.as_deref(), returned))
}

/// Why a popup flow ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupReason {
    Connected,
    StateMismatch,
    MissingCode,
    ProviderDenied,
    NotAuthenticated,
    BackendError,
}

impl PopupReason {
    pub fn message(&self) -> &'static str {
        match self {
            PopupReason::Connected => "Account connected. You can close this window.",
            PopupReason::StateMismatch => "This sign-in link is invalid or has expired.",
            PopupReason::MissingCode => "The provider did not return an authorization code.",
            PopupReason::ProviderDenied => "Access was denied on the provider's page.",
            PopupReason::NotAuthenticated => "Please log in before connecting accounts.",
            PopupReason::BackendError => "The connection could not be completed.",
        }
    }
}

/// Payload posted to `window.opener` by the callback page.
#[derive(Debug, Clone, Serialize)]
pub struct PopupOutcome {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub provider: String,
    pub success: bool,
    pub reason: PopupReason,
}

impl PopupOutcome {
    pub fn new(provider: impl Into<String>, reason: PopupReason) -> Self {
        Self {
            message_type: POPUP_MESSAGE_TYPE,
            provider: provider.into(),
            success: reason == PopupReason::Connected,
            reason,
        }
    }

    /// JSON safe to embed inside an inline `<script>` element.
    pub fn to_script_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| "{}".to_string())
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026")
    }
}
