use serde::{Deserialize, Serialize};

/// Pricing and certificate template for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub id: String,
    pub service_id: String,
    pub is_paid_service: bool,
    #[serde(default)]
    pub rate_of_service: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rate: Option<f64>,
    /// Certificate template with `{{fieldName}}` placeholders.
    #[serde(default)]
    pub certificate_data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ServiceConfig {
    /// `custom_rate` when set and positive, otherwise `rate_of_service`.
    pub fn effective_amount(&self) -> f64 {
        match self.custom_rate {
            Some(rate) if rate > 0.0 => rate,
            _ => self.rate_of_service,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceConfig {
    pub service_id: String,
    #[serde(default)]
    pub is_paid_service: bool,
    #[serde(default)]
    pub rate_of_service: f64,
    #[serde(default)]
    pub custom_rate: Option<f64>,
    #[serde(default)]
    pub certificate_data: String,
}

// ---------------------------------------------------------------------------
// Form availability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Enabled,
    Disabled,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a service accepts submissions. The newest record per service wins;
/// a service with no record is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAvailability {
    pub id: String,
    pub service_id: String,
    pub status: Availability,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvailability {
    pub service_id: String,
    pub status: Availability,
}
