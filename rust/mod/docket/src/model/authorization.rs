use serde::{Deserialize, Serialize};

use super::user::Actor;

/// Highest review stage a service can declare.
pub const MAX_STAGE: u8 = 2;

/// Declares who reviews a service's submissions at a given stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationStep {
    pub id: String,
    pub service_id: String,
    /// A user id or a role name (`auth_1`, `auth_2`).
    pub actor: String,
    /// 1 or 2.
    pub stage: u8,
    #[serde(default)]
    pub subzones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_of: Option<String>,
    #[serde(default)]
    pub can_take_payment: bool,
    #[serde(default)]
    pub can_reject: bool,
    pub created_at: String,
}

impl AuthorizationStep {
    /// Whether this step names `actor`, either directly or through its role.
    pub fn matches(&self, actor: &Actor) -> bool {
        self.actor == actor.id || self.actor == actor.role.as_str()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthorizationStep {
    pub service_id: String,
    pub actor: String,
    pub stage: u8,
    #[serde(default)]
    pub subzones: Vec<String>,
    #[serde(default)]
    pub supervisor_of: Option<String>,
    #[serde(default)]
    pub can_take_payment: bool,
    #[serde(default)]
    pub can_reject: bool,
}

/// Territorial unit referenced by authorization steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subzone {
    pub id: String,
    pub zone_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubzone {
    pub zone_id: String,
    pub name: String,
}
