pub mod account;
pub mod authorization;
pub mod catalog;
pub mod forms;
pub mod orders;
pub mod submission;

use std::sync::Arc;

use docket_blob::{BlobStore, UploadPolicy};
use docket_core::ServiceError;
use docket_kv::KVStore;
use docket_sql::SQLStore;

use crate::engine::StatusEngine;
use crate::model::Actor;
use crate::payment::{OrderLedger, PaymentGateway, SignatureVerifier};
use crate::store::DocketStore;

pub use orders::{CreateOrder, OrderCreated, VerifyPayment};
pub use submission::{ManualPayment, StatusUpdate, SubmissionQuery, SubmissionView, UploadedFile};

/// Configuration for the docket service.
#[derive(Debug, Clone)]
pub struct DocketConfig {
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 15 min).
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds (default: 7 days).
    pub refresh_token_ttl: i64,
    /// Currency for gateway orders.
    pub currency: String,
    /// URL prefix under which stored uploads are served.
    pub public_upload_base: String,
    pub upload_policy: UploadPolicy,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "docket-dev-secret-change-me".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
            currency: "INR".to_string(),
            public_upload_base: "/uploads".to_string(),
            upload_policy: UploadPolicy::default(),
        }
    }
}

/// The docket service. Holds storage backends, the payment gateway and
/// configuration; operations are split across the submodules.
pub struct DocketService {
    pub(crate) store: Arc<DocketStore>,
    pub(crate) engine: StatusEngine,
    pub(crate) ledger: OrderLedger,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) verifier: SignatureVerifier,
    pub(crate) config: DocketConfig,
}

impl DocketService {
    /// Create the service, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        config: DocketConfig,
    ) -> Result<Arc<Self>, ServiceError> {
        let store = Arc::new(DocketStore::new(sql)?);
        tracing::info!(gateway = gateway.name(), "docket service ready");
        Ok(Arc::new(Self {
            engine: StatusEngine::new(store.clone()),
            store,
            ledger: OrderLedger::new(kv),
            blobs,
            gateway,
            verifier,
            config,
        }))
    }

    pub fn config(&self) -> &DocketConfig {
        &self.config
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }
}

pub(crate) fn require_admin(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(format!(
            "role {} cannot manage configuration",
            actor.role
        )))
    }
}

/// Trimmed non-empty string or a validation error naming `what`.
pub(crate) fn required(value: &str, what: &str) -> Result<String, ServiceError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ServiceError::Validation(format!("{what} cannot be empty")));
    }
    Ok(v.to_string())
}
