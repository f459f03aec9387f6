//! Certificate templates.
//!
//! A template is free text with `{{key}}` placeholders filled from a
//! submission's form data. Rendering never fails: missing or empty values
//! become `N/A` and no placeholder survives.
//!
//! The certificate "signature" is a SHA-256 digest of the inputs. Anyone
//! holding the form data and template can recompute it, so it is
//! tamper evidence for display and QR payloads, not authentication.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::FormData;
use crate::schema::parse_date;

/// Placeholder filled with the render date instead of form data.
pub const CURRENT_DATE: &str = "current_date";
pub const MISSING: &str = "N/A";

/// Hex characters of the digest shown on the certificate face.
const SHORT_SIGNATURE_LEN: usize = 16;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap_or_else(|e| panic!("token pattern: {e}"))
});
static LEFTOVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}").unwrap_or_else(|e| panic!("leftover pattern: {e}")));

/// Long-form date, e.g. "March 5, 2024".
pub fn long_date(d: NaiveDate) -> String {
    d.format("%B %-d, %Y").to_string()
}

/// Machine-readable certificate payload, meant to be encoded as a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    pub id: String,
    pub name: String,
    pub service_id: String,
    pub issued_at: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub body: String,
    /// Full hex digest.
    pub signature: String,
    /// Prefix of `signature` printed on the certificate.
    pub short_signature: String,
    pub payload: VerificationPayload,
}

pub struct TemplateRenderer {
    date_keys: BTreeSet<String>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self {
            date_keys: ["submittedAt", "Date of Birth"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TemplateRenderer {
    /// Also format these keys as long dates (a service's DATE fields).
    pub fn with_date_fields<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.date_keys.extend(keys.into_iter().map(String::from));
        self
    }

    /// Fill `template` from `data`, using `today` for `{{current_date}}`.
    pub fn render(&self, template: &str, data: &FormData, today: NaiveDate) -> String {
        let filled = TOKEN.replace_all(template, |caps: &Captures| {
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if key == CURRENT_DATE {
                return long_date(today);
            }
            self.value_for(key, data)
        });

        let mut out = filled.into_owned();
        // Values may themselves contain braces; sweep until nothing is left.
        while LEFTOVER.is_match(&out) {
            out = LEFTOVER.replace_all(&out, MISSING).into_owned();
        }
        out
    }

    fn value_for(&self, key: &str, data: &FormData) -> String {
        let raw = match data.get(key).map(stringify) {
            Some(s) if !s.trim().is_empty() => s,
            _ => return MISSING.to_string(),
        };
        if self.date_keys.contains(key) {
            if let Some(d) = parse_date(&raw) {
                return long_date(d);
            }
        }
        raw
    }

    /// Render and sign a certificate issued at `issued_at`.
    pub fn issue(
        &self,
        submission_id: &str,
        service_id: &str,
        template: &str,
        data: &FormData,
        issued_at: DateTime<Utc>,
    ) -> Certificate {
        let today = issued_at.date_naive();
        let body = self.render(template, data, today);
        let signature = digest(data, template, &long_date(today));
        let name = ["Name", "name", "fullName"]
            .iter()
            .find_map(|k| data.get(*k).map(stringify))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| MISSING.to_string());

        Certificate {
            body,
            short_signature: signature.chars().take(SHORT_SIGNATURE_LEN).collect(),
            payload: VerificationPayload {
                id: submission_id.to_string(),
                name,
                service_id: service_id.to_string(),
                issued_at: issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                signature: signature.clone(),
            },
            signature,
        }
    }
}

/// SHA-256 over the serialized form data, the raw template and the render date.
pub fn digest(data: &FormData, template: &str, date: &str) -> String {
    let mut h = Sha256::new();
    // BTreeMap keys serialize in order, so equal data hashes equally.
    h.update(serde_json::to_string(data).unwrap_or_default().as_bytes());
    h.update(template.as_bytes());
    h.update(date.as_bytes());
    hex::encode(h.finalize())
}

fn stringify(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(stringify)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn data(v: serde_json::Value) -> FormData {
        serde_json::from_value(v).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn fills_known_and_current_date() {
        let r = TemplateRenderer::default();
        let out = r.render(
            "Hello {{name}}, issued {{current_date}}",
            &data(json!({"name": "Bob"})),
            day(),
        );
        assert_eq!(out, "Hello Bob, issued March 5, 2024");
    }

    #[test]
    fn missing_values_become_na() {
        let r = TemplateRenderer::default();
        assert_eq!(r.render("Age: {{age}}", &FormData::new(), day()), "Age: N/A");
        assert_eq!(
            r.render("Age: {{ age }}", &data(json!({"age": ""})), day()),
            "Age: N/A"
        );
        assert_eq!(r.render("{{}} and {{ }}", &FormData::new(), day()), "N/A and N/A");
    }

    #[test]
    fn no_placeholder_survives() {
        let r = TemplateRenderer::default();
        let nasty = data(json!({"a": "{{b}}", "c": "{{"}));
        for template in ["{{a}}", "{{c}}x}}", "{{{{a}}}}", "{{\nmulti\nline}}", "{{a}"] {
            let out = r.render(template, &nasty, day());
            assert!(!LEFTOVER.is_match(&out), "{template:?} -> {out:?}");
        }
    }

    #[test]
    fn dates_are_long_form() {
        let r = TemplateRenderer::default().with_date_fields(["issueDate"]);
        let d = data(json!({
            "Date of Birth": "1990-02-28",
            "submittedAt": "2024-06-01T10:00:00Z",
            "issueDate": "2023-12-25",
            "other": "2023-12-25",
        }));
        let out = r.render(
            "{{Date of Birth}}|{{submittedAt}}|{{issueDate}}|{{other}}",
            &d,
            day(),
        );
        assert_eq!(out, "February 28, 1990|June 1, 2024|December 25, 2023|2023-12-25");
    }

    #[test]
    fn unparseable_date_passes_through() {
        let r = TemplateRenderer::default();
        let out = r.render("{{Date of Birth}}", &data(json!({"Date of Birth": "unknown"})), day());
        assert_eq!(out, "unknown");
    }

    #[test]
    fn lists_and_numbers_stringify() {
        let r = TemplateRenderer::default();
        let out = r.render(
            "{{docs}} / {{fee}} / {{ok}}",
            &data(json!({"docs": ["Aadhaar", "PAN"], "fee": 250, "ok": true})),
            day(),
        );
        assert_eq!(out, "Aadhaar, PAN / 250 / true");
    }

    #[test]
    fn render_is_deterministic_for_same_day() {
        let r = TemplateRenderer::default();
        let d = data(json!({"name": "A"}));
        assert_eq!(
            r.render("{{name}} {{current_date}}", &d, day()),
            r.render("{{name}} {{current_date}}", &d, day())
        );
    }

    #[test]
    fn issue_signs_inputs() {
        let r = TemplateRenderer::default();
        let d = data(json!({"Name": "Asha", "district": "N"}));
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        let cert = r.issue("sub1", "svc1", "Certified: {{Name}}", &d, at);

        assert_eq!(cert.body, "Certified: Asha");
        assert_eq!(cert.signature.len(), 64);
        assert_eq!(cert.short_signature, &cert.signature[..16]);
        assert_eq!(cert.signature, digest(&d, "Certified: {{Name}}", "March 5, 2024"));
        assert_eq!(
            cert.payload,
            VerificationPayload {
                id: "sub1".into(),
                name: "Asha".into(),
                service_id: "svc1".into(),
                issued_at: "2024-03-05T08:00:00Z".into(),
                signature: cert.signature.clone(),
            }
        );

        let tampered = data(json!({"Name": "Asha", "district": "S"}));
        let other = r.issue("sub1", "svc1", "Certified: {{Name}}", &tampered, at);
        assert_ne!(other.signature, cert.signature);
    }
}
