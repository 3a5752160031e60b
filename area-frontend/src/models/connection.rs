use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Third-party services a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Discord,
    Spotify,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Github,
        Provider::Discord,
        Provider::Spotify,
        Provider::Google,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Discord => "discord",
            Provider::Spotify => "spotify",
            Provider::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Github => "GitHub",
            Provider::Discord => "Discord",
            Provider::Spotify => "Spotify",
            Provider::Google => "Google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Link state of one provider account, from `GET /connections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub provider: String,
    pub connected: bool,
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
    /// Provider-specific extras (account name, avatar, guild list, ...).
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ConnectionStatus {
    pub fn disconnected(provider: Provider) -> Self {
        Self {
            provider: provider.slug().to_string(),
            connected: false,
            connected_at: None,
            details: None,
        }
    }

    pub fn account_label(&self) -> Option<String> {
        let details = self.details.as_ref()?;
        ["username", "login", "displayName", "email"]
            .iter()
            .find_map(|key| details.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}

/// One card per known provider, filling the gaps the backend did not report.
#[derive(Debug, Clone)]
pub struct ConnectionCard {
    pub provider: Provider,
    pub status: ConnectionStatus,
}

impl ConnectionCard {
    pub fn for_all(statuses: &[ConnectionStatus]) -> Vec<ConnectionCard> {
        Provider::ALL
            .into_iter()
            .map(|provider| {
                let status = statuses
                    .iter()
                    .find(|s| s.provider.eq_ignore_ascii_case(provider.slug()))
                    .cloned()
                    .unwrap_or_else(|| ConnectionStatus::disconnected(provider));
                ConnectionCard { provider, status }
            })
            .collect()
    }

    pub fn connected_on(&self) -> String {
        self.status
            .connected_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Body of `POST /connections/:provider/start`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStartRequest<'a> {
    pub state: &'a str,
    pub redirect_uri: &'a str,
}

/// Authorization URL the popup is sent to.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStartResponse {
    #[serde(alias = "authorizationUrl")]
    pub url: String,
}

/// Body of `POST /connections/:provider/complete`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCompleteRequest<'a> {
    pub code: &'a str,
    pub state: &'a str,
    pub redirect_uri: &'a str,
}

/// A text channel of a Discord guild the bot can post to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
}
