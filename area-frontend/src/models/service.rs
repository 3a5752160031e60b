use serde::{Deserialize, Serialize};

/// Catalog entry from `GET /services`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ServiceCapability>,
    #[serde(default)]
    pub reactions: Vec<ServiceCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCapability {
    pub id: String,
    pub description: String,
}

impl ServiceInfo {
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn has_reactions(&self) -> bool {
        !self.reactions.is_empty()
    }
}
