//! Bootstrap: first-start checks and the initial admin account.
//!
//! When docketd starts:
//! 1. Verify the config is complete; refuse to start otherwise.
//! 2. Ensure the configured admin account exists.

use docket::service::DocketService;
use tracing::info;

use crate::config::{Provider, ServerConfig};

/// Verify server configuration is ready for use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.admin.password_hash.trim().is_empty() {
        anyhow::bail!(
            "No admin password hash found in configuration.\n\
             Generate an argon2id hash and set [admin] password_hash."
        );
    }
    if password_hash::PasswordHash::new(&config.admin.password_hash).is_err() {
        anyhow::bail!("[admin] password_hash is not a PHC-format hash.");
    }
    if config.admin.email.trim().is_empty() {
        anyhow::bail!("[admin] email is empty in configuration.");
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.jwt.access_ttl_secs <= 0 || config.jwt.refresh_ttl_secs <= 0 {
        anyhow::bail!("JWT token lifetimes must be positive.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.payment.provider == Provider::Razorpay
        && (config.payment.key_id.is_empty() || config.payment.key_secret.is_empty())
    {
        anyhow::bail!("The razorpay provider needs [payment] key_id and key_secret.");
    }
    Ok(())
}

/// Create the configured admin unless an account with its email exists.
pub fn ensure_admin(svc: &DocketService, config: &ServerConfig) -> anyhow::Result<()> {
    let created = svc
        .ensure_admin(
            &config.admin.email,
            &config.admin.name,
            &config.admin.password_hash,
        )
        .map_err(|e| anyhow::anyhow!("failed to create admin account: {e}"))?;
    if created {
        info!(email = %config.admin.email, "Created admin account");
    } else {
        info!(email = %config.admin.email, "Admin account already exists");
    }
    Ok(())
}
