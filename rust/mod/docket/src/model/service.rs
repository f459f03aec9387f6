use serde::{Deserialize, Serialize};

/// A certificate service citizens can apply for ("Birth Certificate").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Backing table name used by reporting exports.
    pub table_name: String,
    /// Processing time limit in days.
    pub time_limit: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateService {
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub time_limit: Option<u32>,
}

/// Default time limit when an admin does not set one.
pub const DEFAULT_TIME_LIMIT_DAYS: u32 = 30;

/// Derive a table name from a display name: `"Birth Certificate"` → `"birth_certificate"`.
pub fn table_name_for(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_table_names() {
        assert_eq!(table_name_for("Birth Certificate"), "birth_certificate");
        assert_eq!(table_name_for("  Income / Caste  "), "income_caste");
        assert_eq!(table_name_for("NOC-2"), "noc_2");
    }
}
