//! Docket module: certificate issuance workflow.
//!
//! # Resources
//!
//! - **Service**: a certificate citizens can apply for, with its form,
//!   pricing, certificate template and availability
//! - **Submission**: a citizen's application, moved through two review
//!   stages by the status engine
//! - **OptionList**: reusable choices for SELECT/RADIO/CHECKBOX fields
//! - **AuthorizationStep**: who reviews a service at which stage
//! - **User** / **Session**: accounts and JWT issuance records
//!
//! # Usage
//!
//! ```ignore
//! use docket::{DocketModule, service::DocketConfig};
//!
//! let module = DocketModule::new(sql, kv, blobs, gateway, verifier, DocketConfig::default())?;
//! let router = module.routes(); // mount under /api/admin
//! ```

pub mod api;
pub mod engine;
pub mod model;
pub mod payment;
pub mod schema;
pub mod service;
pub mod store;
pub mod template;

use std::sync::Arc;

use axum::Router;

use docket_blob::BlobStore;
use docket_core::{Module, ServiceError};
use docket_kv::KVStore;
use docket_sql::SQLStore;

use crate::payment::{PaymentGateway, SignatureVerifier};
use crate::service::{DocketConfig, DocketService};

/// Docket module implementing the Module trait.
pub struct DocketModule {
    service: Arc<DocketService>,
}

impl DocketModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        config: DocketConfig,
    ) -> Result<Self, ServiceError> {
        let service = DocketService::new(sql, kv, blobs, gateway, verifier, config)?;
        Ok(Self { service })
    }

    /// The underlying service, shared with the server's auth layer.
    pub fn service(&self) -> &Arc<DocketService> {
        &self.service
    }
}

impl Module for DocketModule {
    fn name(&self) -> &str {
        "admin"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
