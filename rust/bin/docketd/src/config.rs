//! Server configuration, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Directory bare context names resolve into.
const CONFIG_DIR: &str = "/etc/docket";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub admin: AdminConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub mode: Mode,
}

/// Bootstrap administrator, created on first start.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
    /// argon2id hash in PHC string format.
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Razorpay,
    /// Orders are minted locally; for development.
    #[default]
    Offline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub key_secret: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            key_id: String::new(),
            key_secret: String::new(),
            api_base: None,
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadsConfig {
    /// Public origin uploads are served from, e.g. `https://docket.example.org`.
    /// Empty means same-origin relative URLs.
    #[serde(default)]
    pub public_base_url: String,
}

impl UploadsConfig {
    /// URL prefix placed in front of stored upload keys.
    pub fn url_prefix(&self) -> String {
        format!("{}/uploads", self.public_base_url.trim_end_matches('/'))
    }
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_access_ttl() -> i64 {
    900
}

fn default_refresh_ttl() -> i64 {
    604_800
}

fn default_currency() -> String {
    "INR".to_string()
}

impl ServerConfig {
    /// A value containing `/` or ending in `.toml` is a path; anything else
    /// names `/etc/docket/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.ends_with(".toml") {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[admin]
email = "root@example.com"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo"

[jwt]
secret = "s3cret"

[storage]
data_dir = "/var/lib/docket"
"#;

    #[test]
    fn defaults_fill_optional_sections() {
        let c = ServerConfig::parse(MINIMAL).unwrap();
        assert_eq!(c.server.mode, Mode::Production);
        assert_eq!(c.jwt.access_ttl_secs, 900);
        assert_eq!(c.jwt.refresh_ttl_secs, 604_800);
        assert_eq!(c.payment.provider, Provider::Offline);
        assert_eq!(c.payment.currency, "INR");
        assert_eq!(c.admin.name, "Administrator");
        assert_eq!(c.uploads.url_prefix(), "/uploads");
    }

    #[test]
    fn full_config() {
        let raw = format!(
            "{MINIMAL}\n[server]\nmode = \"development\"\n\n[payment]\nprovider = \"razorpay\"\n\
             key_id = \"rzp_test\"\nkey_secret = \"xyz\"\n\n[uploads]\npublic_base_url = \"https://d.example.org/\"\n"
        );
        let c = ServerConfig::parse(&raw).unwrap();
        assert_eq!(c.server.mode, Mode::Development);
        assert_eq!(c.payment.provider, Provider::Razorpay);
        assert_eq!(c.uploads.url_prefix(), "https://d.example.org/uploads");
    }

    #[test]
    fn resolve_names_and_paths() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/docket/prod.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./local.toml"),
            PathBuf::from("./local.toml")
        );
    }
}
