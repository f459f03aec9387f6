use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Submitted form payload: field name → value (string, number, bool or file URL).
///
/// Ordered so its JSON serialization is stable.
pub type FormData = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// SubmissionStatus
// ---------------------------------------------------------------------------

/// Review lifecycle of a submission.
///
/// ```text
/// STAGE_1_PENDING → STAGE_2_PENDING → COMPLETED
///        ↓                 ↓
///     REJECTED          REJECTED
/// ```
///
/// `COMPLETED` and `REJECTED` are absorbing. Legacy names (`auth_1`, `auth_2`,
/// `done`) are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[serde(rename = "stage_1_pending", alias = "auth_1")]
    Stage1Pending,
    #[serde(rename = "stage_2_pending", alias = "auth_2")]
    Stage2Pending,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "completed", alias = "done")]
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage1Pending => "stage_1_pending",
            Self::Stage2Pending => "stage_2_pending",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stage_1_pending" | "auth_1" => Some(Self::Stage1Pending),
            "stage_2_pending" | "auth_2" => Some(Self::Stage2Pending),
            "rejected" => Some(Self::Rejected),
            "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Review stage number for pending states.
    pub fn stage(&self) -> Option<u8> {
        match self {
            Self::Stage1Pending => Some(1),
            Self::Stage2Pending => Some(2),
            _ => None,
        }
    }

    /// Position along the lifecycle; transitions only ever increase it.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Stage1Pending => 0,
            Self::Stage2Pending => 1,
            Self::Rejected | Self::Completed => 2,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order state as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Created,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Minor currency units (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub status: GatewayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One processing action recorded against a submission. Never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Actor user id.
    pub user: String,
    pub role: String,
    pub action: String,
    pub remark: String,
    pub processed_at: String,
}

/// A citizen's application for a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub service_id: String,
    pub form_data: FormData,
    pub status: SubmissionStatus,
    pub payment_status: PaymentStatus,
    pub submitted_by: String,
    pub submitted_at: String,
    #[serde(default)]
    pub processed_by: Vec<AuditEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<PaymentDetails>,
    /// Incremented on every write; writes compare-and-swap on it.
    #[serde(default)]
    pub version: i64,
    pub updated_at: String,
}
