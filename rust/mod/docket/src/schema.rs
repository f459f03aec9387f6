use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;

use docket_blob::UploadPolicy;
use docket_core::ServiceError;

use crate::model::{FieldType, FormData, FormField, OptionItem, OptionList};

pub(crate) static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// One rendered form control.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub field_name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Where stored uploads are published. UPLOAD values must be URLs under
/// `base` whose file name the policy could have generated for the field.
#[derive(Debug, Clone)]
pub struct UploadRefs {
    pub base: String,
    pub policy: UploadPolicy,
}

impl Default for UploadRefs {
    fn default() -> Self {
        Self {
            base: "/uploads".to_string(),
            policy: UploadPolicy::default(),
        }
    }
}

impl UploadRefs {
    /// Storage key behind `url` when it names an upload for `field`.
    pub fn key_of<'u>(&self, field: &str, url: &'u str) -> Option<&'u str> {
        let key = url
            .strip_prefix(self.base.trim_end_matches('/'))?
            .strip_prefix('/')?;
        self.policy.owns_key(field, key).then_some(key)
    }
}

/// A service's fields resolved against their option lists, in render order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub service_id: String,
    pub widgets: Vec<Widget>,
    #[serde(skip)]
    uploads: UploadRefs,
}

impl FormSchema {
    /// Resolve `fields` into widgets ordered by `position`.
    ///
    /// Unknown field types and SELECT/RADIO fields without a non-empty option
    /// list are configuration errors.
    pub fn resolve(
        service_id: &str,
        mut fields: Vec<FormField>,
        lists: &HashMap<String, OptionList>,
    ) -> Result<Self, ServiceError> {
        fields.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let mut widgets = Vec::with_capacity(fields.len());
        for f in fields {
            let kind = f.kind()?;
            let list = f.option_list_id.as_deref().and_then(|id| lists.get(id));
            if kind.needs_options() {
                match list {
                    Some(l) if !l.options.is_empty() => {}
                    _ => {
                        return Err(ServiceError::Configuration(format!(
                            "{kind} field {:?} needs a non-empty option list",
                            f.field_name
                        )));
                    }
                }
            }
            widgets.push(Widget {
                options: list.map(|l| l.options.clone()).unwrap_or_default(),
                field_name: f.field_name,
                label: f.label,
                field_type: kind,
                required: f.required,
                min: f.min,
                max: f.max,
                help_text: f.help_text,
                notes: f.notes,
            });
        }

        Ok(Self {
            service_id: service_id.to_string(),
            widgets,
            uploads: UploadRefs::default(),
        })
    }

    pub fn with_uploads(mut self, uploads: UploadRefs) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Storage keys of the uploads `data` refers to, by field name.
    pub fn upload_keys<'d>(&self, data: &'d FormData) -> Vec<(&str, &'d str)> {
        self.widgets
            .iter()
            .filter(|w| w.field_type == FieldType::Upload)
            .filter_map(|w| {
                let url = data.get(&w.field_name)?.as_str()?;
                Some((w.field_name.as_str(), self.uploads.key_of(&w.field_name, url.trim())?))
            })
            .collect()
    }

    /// Names of DATE fields; the certificate renderer formats these.
    pub fn date_fields(&self) -> Vec<&str> {
        self.widgets
            .iter()
            .filter(|w| w.field_type == FieldType::Date)
            .map(|w| w.field_name.as_str())
            .collect()
    }

    pub fn upload_fields(&self) -> Vec<&str> {
        self.widgets
            .iter()
            .filter(|w| w.field_type == FieldType::Upload)
            .map(|w| w.field_name.as_str())
            .collect()
    }

    /// Check `data` against every widget and return it restricted to the
    /// schema's keys. All problems are reported together.
    pub fn validate(&self, mut data: FormData) -> Result<FormData, ServiceError> {
        let mut errors = Vec::new();
        let mut accepted = FormData::new();

        for w in &self.widgets {
            let value = data.remove(&w.field_name);
            match value {
                Some(v) if !is_blank(&v) => match check(w, &v, &self.uploads) {
                    Ok(()) => {
                        accepted.insert(w.field_name.clone(), v);
                    }
                    Err(msg) => errors.push(format!("{}: {msg}", w.label)),
                },
                _ if w.required => errors.push(format!("{} is required", w.label)),
                _ => {}
            }
        }

        if !data.is_empty() {
            tracing::debug!(
                service = %self.service_id,
                dropped = ?data.keys().collect::<Vec<_>>(),
                "ignoring keys outside the form schema"
            );
        }

        if errors.is_empty() {
            Ok(accepted)
        } else {
            Err(ServiceError::Validation(errors.join("; ")))
        }
    }
}

fn is_blank(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn as_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn check(w: &Widget, v: &serde_json::Value, uploads: &UploadRefs) -> Result<(), String> {
    match w.field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Email => {
            let s = as_text(v).ok_or("must be text")?;
            if w.field_type == FieldType::Email && !EMAIL.is_match(&s) {
                return Err("must be an email address".into());
            }
            bounds(s.chars().count() as f64, w, "characters")
        }
        FieldType::Number => {
            let n = match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or("must be a number")?;
            bounds(n, w, "")
        }
        FieldType::Date => {
            let s = as_text(v).ok_or("must be a date")?;
            parse_date(&s).map(|_| ()).ok_or_else(|| "must be a date (YYYY-MM-DD)".into())
        }
        FieldType::Time => {
            let s = as_text(v).ok_or("must be a time")?;
            NaiveTime::parse_from_str(&s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
                .map(|_| ())
                .map_err(|_| "must be a time (HH:MM)".into())
        }
        FieldType::Select | FieldType::Radio => {
            let s = as_text(v).ok_or("must be a single choice")?;
            if accepts(&w.options, &s) {
                Ok(())
            } else {
                Err(format!("{s:?} is not one of the offered options"))
            }
        }
        FieldType::Checkbox => check_checkbox(w, v),
        FieldType::Upload => {
            let s = as_text(v).ok_or("must be a file reference")?;
            match uploads.key_of(&w.field_name, &s) {
                Some(_) => Ok(()),
                None => Err("must be a file uploaded through this form".into()),
            }
        }
    }
}

fn check_checkbox(w: &Widget, v: &serde_json::Value) -> Result<(), String> {
    match v {
        serde_json::Value::Bool(_) => Ok(()),
        serde_json::Value::Array(items) if !w.options.is_empty() => {
            for item in items {
                let s = as_text(item).ok_or("must list option values")?;
                if !accepts(&w.options, &s) {
                    return Err(format!("{s:?} is not one of the offered options"));
                }
            }
            Ok(())
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if !w.options.is_empty() && accepts(&w.options, s) {
                return Ok(());
            }
            match s.to_ascii_lowercase().as_str() {
                "true" | "false" | "on" | "off" | "yes" | "no" => Ok(()),
                _ => Err("must be checked or unchecked".into()),
            }
        }
        _ => Err("must be checked or unchecked".into()),
    }
}

fn accepts(options: &[OptionItem], v: &str) -> bool {
    options.iter().any(|o| o.value == v || o.label == v)
}

fn bounds(n: f64, w: &Widget, unit: &str) -> Result<(), String> {
    let unit = if unit.is_empty() { String::new() } else { format!(" {unit}") };
    if let Some(min) = w.min {
        if n < min {
            return Err(format!("must be at least {min}{unit}"));
        }
    }
    if let Some(max) = w.max {
        if n > max {
            return Err(format!("must be at most {max}{unit}"));
        }
    }
    Ok(())
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, ty: &str, position: i64) -> FormField {
        FormField {
            id: format!("f-{name}"),
            service_id: "svc".into(),
            field_name: name.into(),
            field_type: ty.into(),
            label: name.into(),
            required: false,
            min: None,
            max: None,
            option_list_id: None,
            help_text: None,
            notes: None,
            position,
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn districts() -> OptionList {
        OptionList {
            id: "l1".into(),
            name: "Districts".into(),
            options: vec![
                OptionItem {
                    label: "North".into(),
                    value: "N".into(),
                },
                OptionItem {
                    label: "South".into(),
                    value: "S".into(),
                },
            ],
            version: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn lists() -> HashMap<String, OptionList> {
        HashMap::from([("l1".to_string(), districts())])
    }

    fn data(v: serde_json::Value) -> FormData {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn widgets_follow_position() {
        let fields = vec![field("b", "DATE", 2), field("a", "INPUT-TEXT", 1), field("c", "UPLOAD", 3)];
        let schema = FormSchema::resolve("svc", fields, &HashMap::new()).unwrap();
        let names: Vec<&str> = schema.widgets().iter().map(|w| w.field_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(schema.date_fields(), vec!["b"]);
        assert_eq!(schema.upload_fields(), vec!["c"]);
    }

    #[test]
    fn unknown_type_is_configuration_error() {
        let err = FormSchema::resolve("svc", vec![field("x", "SLIDER", 1)], &HashMap::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn choice_field_needs_options() {
        let mut f = field("district", "SELECT", 1);
        assert!(matches!(
            FormSchema::resolve("svc", vec![f.clone()], &lists()),
            Err(ServiceError::Configuration(_))
        ));

        f.option_list_id = Some("l1".into());
        let schema = FormSchema::resolve("svc", vec![f], &lists()).unwrap();
        assert_eq!(schema.widgets()[0].options.len(), 2);

        let mut empty = districts();
        empty.options.clear();
        let mut radio = field("r", "RADIO", 1);
        radio.option_list_id = Some("l1".into());
        let only_empty = HashMap::from([("l1".to_string(), empty)]);
        assert!(FormSchema::resolve("svc", vec![radio], &only_empty).is_err());
    }

    #[test]
    fn required_and_unknown_keys() {
        let mut name = field("name", "INPUT-TEXT", 1);
        name.required = true;
        let schema = FormSchema::resolve("svc", vec![name], &HashMap::new()).unwrap();

        let err = schema.validate(data(json!({"name": "  "}))).unwrap_err();
        assert_eq!(err.to_string(), "name is required");

        let ok = schema.validate(data(json!({"name": "A", "extra": 1}))).unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok["name"], "A");
    }

    #[test]
    fn typed_checks() {
        let mut age = field("age", "INPUT-NUMBER", 1);
        age.min = Some(0.0);
        age.max = Some(120.0);
        let mut pin = field("pin", "INPUT-TEXT", 2);
        pin.min = Some(6.0);
        pin.max = Some(6.0);
        let mut district = field("district", "SELECT", 7);
        district.option_list_id = Some("l1".into());
        let fields = vec![
            age,
            pin,
            field("email", "INPUT-EMAIL", 3),
            field("dob", "DATE", 4),
            field("slot", "TIME", 5),
            field("proof", "UPLOAD", 6),
            district,
            field("consent", "CHECKBOX", 8),
        ];
        let schema = FormSchema::resolve("svc", fields, &lists()).unwrap();

        let good = data(json!({
            "age": "42",
            "pin": "560001",
            "email": "a@b.in",
            "dob": "1990-02-28",
            "slot": "09:30",
            "proof": "/uploads/proof-1-2.pdf",
            "district": "S",
            "consent": true,
        }));
        assert_eq!(schema.validate(good).unwrap().len(), 8);

        let bad = data(json!({
            "age": 130,
            "pin": "5600",
            "email": "nope",
            "dob": "28/02/1990",
            "slot": "9am",
            "proof": "C:\\proof.pdf",
            "district": "East",
            "consent": "maybe",
        }));
        let msg = schema.validate(bad).unwrap_err().to_string();
        for label in ["age", "pin", "email", "dob", "slot", "proof", "district", "consent"] {
            assert!(msg.contains(&format!("{label}:")), "{label} missing from {msg}");
        }
    }

    #[test]
    fn uploads_must_point_at_stored_files() {
        let mut proof = field("Proof", "UPLOAD", 1);
        proof.required = true;
        let schema = FormSchema::resolve("svc", vec![proof], &HashMap::new())
            .unwrap()
            .with_uploads(UploadRefs {
                base: "https://docs.example.gov/uploads/".into(),
                policy: UploadPolicy::default(),
            });

        for foreign in [
            "https://evil.example/payload.exe",
            "https://evil.example/uploads/Proof-1-2.pdf",
            "/uploads/Proof-1-2.pdf",
            "https://docs.example.gov/uploads/Photo-1-2.pdf",
            "https://docs.example.gov/uploads/Proof-1-2.exe",
        ] {
            assert!(schema.validate(data(json!({"Proof": foreign}))).is_err(), "{foreign}");
        }

        let ours = "https://docs.example.gov/uploads/Proof-1718000000000-123456789.pdf";
        let form = schema.validate(data(json!({"Proof": ours}))).unwrap();
        assert_eq!(
            schema.upload_keys(&form),
            vec![("Proof", "Proof-1718000000000-123456789.pdf")]
        );
    }

    #[test]
    fn checkbox_with_options_takes_a_list() {
        let mut docs = field("docs", "CHECKBOX", 1);
        docs.option_list_id = Some("l1".into());
        let schema = FormSchema::resolve("svc", vec![docs], &lists()).unwrap();
        assert!(schema.validate(data(json!({"docs": ["N", "South"]}))).is_ok());
        assert!(schema.validate(data(json!({"docs": ["N", "West"]}))).is_err());
    }

    #[test]
    fn dates_accept_timestamps() {
        assert_eq!(
            parse_date("2024-03-05T10:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert!(parse_date("March 5").is_none());
    }
}
