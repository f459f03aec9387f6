//! `docketd`: the certificate issuance server.
//!
//! Usage:
//!   docketd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/docket/<name>.toml`.
//! If a path with `/` or `.toml` is given, it's used directly.

mod auth_middleware;
mod bootstrap;
mod config;
mod login;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use docket::payment::{OfflineGateway, PaymentGateway, RazorpayGateway, SignatureVerifier};
use docket::service::DocketConfig;
use docket::DocketModule;
use docket_core::{DataPaths, Module};

use config::{Mode, Provider, ServerConfig};

/// Docket certificate issuance server.
#[derive(Parser, Debug)]
#[command(name = "docketd", about = "Certificate issuance server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address.
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    if server_config.server.mode == Mode::Development {
        docket_core::expose_internal_details(true);
        info!("Development mode: 5xx responses carry error details");
    }

    // Storage.
    let paths = DataPaths::new(&server_config.storage.data_dir);
    std::fs::create_dir_all(&paths.data_dir)?;
    let upload_dir = paths.resolve_upload_dir();

    let sql: Arc<dyn docket_sql::SQLStore> = Arc::new(
        docket_sql::SqliteStore::open(&paths.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let kv: Arc<dyn docket_kv::KVStore> = Arc::new(
        docket_kv::RedbStore::open(&paths.resolve_ledger_path())
            .map_err(|e| anyhow::anyhow!("failed to open order ledger: {}", e))?,
    );
    let blobs: Arc<dyn docket_blob::BlobStore> = Arc::new(
        docket_blob::FileStore::open(&upload_dir)
            .map_err(|e| anyhow::anyhow!("failed to open upload store: {}", e))?,
    );

    // Payments.
    let payment = &server_config.payment;
    let gateway: Arc<dyn PaymentGateway> = match payment.provider {
        Provider::Razorpay => Arc::new(RazorpayGateway::new(
            payment.api_base.clone(),
            payment.key_id.clone(),
            payment.key_secret.clone(),
        )),
        Provider::Offline => Arc::new(OfflineGateway),
    };
    // Offline checkouts are signed with the JWT secret when no key is set.
    let verifier = if payment.key_secret.is_empty() {
        SignatureVerifier::new(&server_config.jwt.secret)
    } else {
        SignatureVerifier::new(&payment.key_secret)
    };

    let docket_config = DocketConfig {
        jwt_secret: server_config.jwt.secret.clone(),
        access_token_ttl: server_config.jwt.access_ttl_secs,
        refresh_token_ttl: server_config.jwt.refresh_ttl_secs,
        currency: payment.currency.clone(),
        public_upload_base: server_config.uploads.url_prefix(),
        ..Default::default()
    };

    let module = DocketModule::new(sql, kv, blobs, gateway, verifier, docket_config)?;
    info!(gateway = module.service().gateway_name(), "Docket module initialized");

    bootstrap::ensure_admin(module.service(), &server_config)?;

    let module_routes = vec![(module.name(), module.routes())];
    let app = routes::build_router(module.service().clone(), module_routes, &upload_dir);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("docketd listening on {}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
