use serde::{Deserialize, Serialize};

use docket_core::ServiceError;

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Input widget kinds a form field may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Email,
    Number,
    Date,
    Time,
    Select,
    Checkbox,
    Radio,
    Textarea,
    Upload,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        Self::Text,
        Self::Email,
        Self::Number,
        Self::Date,
        Self::Time,
        Self::Select,
        Self::Checkbox,
        Self::Radio,
        Self::Textarea,
        Self::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "INPUT-TEXT",
            Self::Email => "INPUT-EMAIL",
            Self::Number => "INPUT-NUMBER",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Select => "SELECT",
            Self::Checkbox => "CHECKBOX",
            Self::Radio => "RADIO",
            Self::Textarea => "TEXTAREA",
            Self::Upload => "UPLOAD",
        }
    }

    /// Parse a wire name. Short lower-case aliases (`text`, `email`, ...) are accepted.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INPUT-TEXT" | "TEXT" => Some(Self::Text),
            "INPUT-EMAIL" | "EMAIL" => Some(Self::Email),
            "INPUT-NUMBER" | "NUMBER" => Some(Self::Number),
            "DATE" => Some(Self::Date),
            "TIME" => Some(Self::Time),
            "SELECT" => Some(Self::Select),
            "CHECKBOX" => Some(Self::Checkbox),
            "RADIO" => Some(Self::Radio),
            "TEXTAREA" => Some(Self::Textarea),
            "UPLOAD" | "FILE" => Some(Self::Upload),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Email => "Email",
            Self::Number => "Number",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Select => "Dropdown",
            Self::Checkbox => "Checkbox",
            Self::Radio => "Radio buttons",
            Self::Textarea => "Multi-line text",
            Self::Upload => "File upload",
        }
    }

    /// Choice widgets draw their options from an option list.
    pub fn needs_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        FieldType::from_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown field type {raw:?}")))
    }
}

// ---------------------------------------------------------------------------
// FormField
// ---------------------------------------------------------------------------

/// One field of a service's application form.
///
/// `field_type` is kept as the stored string so a record written by an older
/// release with a type this build does not know still loads; [`FormField::kind`]
/// turns it into a configuration error when the form is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub service_id: String,
    /// Key into the submission's form data.
    pub field_name: String,
    pub field_type: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub position: i64,
    pub created_at: String,
}

impl FormField {
    pub fn kind(&self) -> Result<FieldType, ServiceError> {
        FieldType::from_str(&self.field_type).ok_or_else(|| {
            ServiceError::Configuration(format!(
                "field {:?} has unsupported type {:?}",
                self.field_name, self.field_type
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormField {
    pub service_id: String,
    /// Defaults to `label`.
    #[serde(default)]
    pub field_name: Option<String>,
    pub field_type: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub option_list_id: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to one past the current last field.
    #[serde(default)]
    pub position: Option<i64>,
}
