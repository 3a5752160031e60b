use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user-defined automation: one trigger ("action") paired with one effect
/// ("reaction"), as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub action: AreaEndpoint,
    pub reaction: AreaEndpoint,
    pub created_at: DateTime<Utc>,
}

/// One side of an Area: the service it runs on and what it does there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaEndpoint {
    pub service: String,
    pub description: String,
    /// Trigger/effect parameters, e.g. `{ "channelId": "..." }` for Discord.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Area {
    pub fn created_on(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

/// Payload for `POST /areas`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArea {
    pub name: String,
    pub enabled: bool,
    pub action: AreaEndpoint,
    pub reaction: AreaEndpoint,
}

/// Partial update for `PATCH /areas/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<AreaEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<AreaEndpoint>,
}

impl AreaPatch {
    pub fn toggle(area: &Area) -> Self {
        Self {
            enabled: Some(!area.enabled),
            ..Default::default()
        }
    }
}

/// Flat HTML form used by the create and edit screens.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AreaForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Pick an action service"))]
    pub action_service: String,
    #[validate(length(min = 1, message = "Describe the action"))]
    pub action_description: String,
    #[validate(length(min = 1, message = "Pick a reaction service"))]
    pub reaction_service: String,
    #[validate(length(min = 1, message = "Describe the reaction"))]
    pub reaction_description: String,
    /// Target Discord channel when the reaction posts to Discord.
    #[serde(default)]
    pub reaction_channel_id: Option<String>,
    /// Checkbox: present ("on") when ticked.
    #[serde(default)]
    pub enabled: Option<String>,
}

impl AreaForm {
    pub fn from_area(area: &Area) -> Self {
        let reaction_channel_id = area
            .reaction
            .config
            .as_ref()
            .and_then(|c| c.get("channelId"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Self {
            name: area.name.clone(),
            action_service: area.action.service.clone(),
            action_description: area.action.description.clone(),
            reaction_service: area.reaction.service.clone(),
            reaction_description: area.reaction.description.clone(),
            reaction_channel_id,
            enabled: area.enabled.then(|| "on".to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.is_some()
    }

    pub fn channel_id(&self) -> &str {
        self.reaction_channel_id.as_deref().unwrap_or("")
    }

    /// Trims every text field so validation sees what the backend will get.
    pub fn normalized(self) -> Self {
        let trim = |value: String| value.trim().to_string();
        Self {
            name: trim(self.name),
            action_service: trim(self.action_service),
            action_description: trim(self.action_description),
            reaction_service: trim(self.reaction_service),
            reaction_description: trim(self.reaction_description),
            reaction_channel_id: self
                .reaction_channel_id
                .map(trim)
                .filter(|id| !id.is_empty()),
            enabled: self.enabled,
        }
    }

    fn endpoints(&self) -> (AreaEndpoint, AreaEndpoint) {
        let reaction_config = with_channel(None, self.reaction_channel_id.as_deref());

        (
            AreaEndpoint {
                service: self.action_service.trim().to_string(),
                description: self.action_description.trim().to_string(),
                config: None,
            },
            AreaEndpoint {
                service: self.reaction_service.trim().to_string(),
                description: self.reaction_description.trim().to_string(),
                config: reaction_config,
            },
        )
    }

    pub fn into_new_area(self) -> NewArea {
        let (action, reaction) = self.endpoints();
        NewArea {
            name: self.name.trim().to_string(),
            enabled: self.is_enabled(),
            action,
            reaction,
        }
    }

    /// Patch against the stored Area. The form has no fields for endpoint
    /// config, so config survives as long as the service stays the same; the
    /// action is left out entirely when nothing about it changed.
    pub fn into_patch(self, current: &Area) -> AreaPatch {
        let (mut action, mut reaction) = self.endpoints();

        if action.service == current.action.service {
            action.config = current.action.config.clone();
        }
        if reaction.service == current.reaction.service {
            reaction.config = with_channel(
                current.reaction.config.clone(),
                self.reaction_channel_id.as_deref(),
            );
        }

        AreaPatch {
            name: Some(self.name.trim().to_string()),
            enabled: Some(self.is_enabled()),
            action: (action != current.action).then_some(action),
            reaction: Some(reaction),
        }
    }
}

/// Sets (or clears, when blank) `channelId` on an endpoint config, keeping
/// any other keys.
fn with_channel(
    config: Option<serde_json::Value>,
    channel_id: Option<&str>,
) -> Option<serde_json::Value> {
    let channel_id = channel_id.map(str::trim).filter(|id| !id.is_empty());

    let mut map = match config {
        Some(serde_json::Value::Object(map)) => map,
        Some(other) if channel_id.is_none() => return Some(other),
        _ => serde_json::Map::new(),
    };
    match channel_id {
        Some(id) => {
            map.insert("channelId".to_string(), serde_json::Value::from(id));
        }
        None => {
            map.remove("channelId");
        }
    }

    (!map.is_empty()).then_some(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_area() -> Area {
        serde_json::from_value(serde_json::json!({
            "id": "a1",
            "name": "Star to Discord",
            "enabled": true,
            "action": { "service": "github", "description": "New star" },
            "reaction": {
                "service": "discord",
                "description": "Post message",
                "config": { "channelId": "42" }
            },
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn area_reads_camel_case_backend_payload() {
        let area = sample_area();
        assert_eq!(area.action.service, "github");
        assert!(area.action.config.is_none());
        assert_eq!(area.created_on(), "2024-03-01");
    }

    #[test]
    fn toggle_patch_only_sends_enabled() {
        let patch = AreaPatch::toggle(&sample_area());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "enabled": false }));
    }

    #[test]
    fn form_round_trips_channel_id_into_reaction_config() {
        let form = AreaForm::from_area(&sample_area());
        assert_eq!(form.channel_id(), "42");
        assert!(form.is_enabled());

        let new_area = form.into_new_area();
        assert_eq!(
            new_area.reaction.config,
            Some(serde_json::json!({ "channelId": "42" }))
        );
    }

    #[test]
    fn blank_channel_id_is_dropped() {
        let form = AreaForm {
            name: " Daily digest ".into(),
            action_service: "spotify".into(),
            action_description: "New liked song".into(),
            reaction_service: "discord".into(),
            reaction_description: "Post".into(),
            reaction_channel_id: Some("  ".into()),
            enabled: None,
        };

        let new_area = form.into_new_area();
        assert_eq!(new_area.name, "Daily digest");
        assert!(!new_area.enabled);
        assert!(new_area.reaction.config.is_none());
    }

    #[test]
    fn form_validation_rejects_empty_name() {
        let form = AreaForm {
            name: String::new(),
            ..AreaForm::from_area(&sample_area())
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn whitespace_only_fields_fail_validation_once_trimmed() {
        let form = AreaForm {
            name: "   ".into(),
            reaction_service: "  ".into(),
            ..AreaForm::from_area(&sample_area())
        }
        .normalized();

        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("reaction_service"));
        assert!(!fields.contains_key("action_service"));
    }

    #[test]
    fn normalized_form_keeps_real_values() {
        let form = AreaForm {
            name: "  Nightly  ".into(),
            reaction_channel_id: Some(" 7 ".into()),
            ..AreaForm::from_area(&sample_area())
        }
        .normalized();

        assert!(form.validate().is_ok());
        assert_eq!(form.name, "Nightly");
        assert_eq!(form.channel_id(), "7");
    }

    fn area_with_configs() -> Area {
        let mut area = sample_area();
        area.action.config = Some(serde_json::json!({ "repo": "o/r" }));
        area.reaction.config = Some(serde_json::json!({ "channelId": "42", "mention": "@here" }));
        area
    }

    #[test]
    fn editing_the_name_keeps_endpoint_config() {
        let current = area_with_configs();
        let form = AreaForm {
            name: "Renamed".into(),
            ..AreaForm::from_area(&current)
        };

        let json = serde_json::to_value(form.into_patch(&current)).unwrap();
        assert_eq!(json["name"], "Renamed");
        assert!(json.get("action").is_none());
        assert_eq!(
            json["reaction"]["config"],
            serde_json::json!({ "channelId": "42", "mention": "@here" })
        );
    }

    #[test]
    fn changed_action_description_keeps_action_config() {
        let current = area_with_configs();
        let form = AreaForm {
            action_description: "New fork".into(),
            reaction_channel_id: Some("99".into()),
            ..AreaForm::from_area(&current)
        };

        let patch = form.into_patch(&current);
        let action = patch.action.unwrap();
        assert_eq!(action.description, "New fork");
        assert_eq!(action.config, Some(serde_json::json!({ "repo": "o/r" })));
        assert_eq!(
            patch.reaction.unwrap().config,
            Some(serde_json::json!({ "channelId": "99", "mention": "@here" }))
        );
    }

    #[test]
    fn switching_service_drops_the_old_config() {
        let current = area_with_configs();
        let form = AreaForm {
            action_service: "gitlab".into(),
            reaction_service: "slack".into(),
            reaction_channel_id: None,
            ..AreaForm::from_area(&current)
        };

        let patch = form.into_patch(&current);
        assert!(patch.action.unwrap().config.is_none());
        assert!(patch.reaction.unwrap().config.is_none());
    }
}
