use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use docket_core::ServiceError;
use docket_kv::{KVStore, KVStoreExt};

type HmacSha256 = Hmac<Sha256>;

/// Smallest order the gateway accepts, in minor units (paise).
pub const MIN_MINOR_UNITS: i64 = 100;

/// Convert a configured amount (rupees) to minor units.
pub fn to_minor_units(amount: f64) -> Result<i64, ServiceError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    let minor = (amount * 100.0).round() as i64;
    if minor < MIN_MINOR_UNITS {
        return Err(ServiceError::Validation(format!(
            "amount {amount} is below the gateway minimum of {}",
            MIN_MINOR_UNITS as f64 / 100.0
        )));
    }
    Ok(minor)
}

// ---------------------------------------------------------------------------
// Gateway adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Order handle returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn create_order(&self, req: &OrderRequest) -> Result<GatewayOrder, ServiceError>;
}

/// Razorpay Orders API client.
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub const DEFAULT_API_BASE: &'static str = "https://api.razorpay.com/v1";

    pub fn new(api_base: Option<String>, key_id: String, key_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base
                .unwrap_or_else(|| Self::DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &str {
        "razorpay"
    }

    async fn create_order(&self, req: &OrderRequest) -> Result<GatewayOrder, ServiceError> {
        let resp = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(req)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("order creation failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "gateway rejected order");
            return Err(ServiceError::Gateway(format!(
                "order creation returned {status}"
            )));
        }

        let order: GatewayOrder = resp
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(format!("unexpected order response: {e}")))?;
        if order.id.is_empty() {
            return Err(ServiceError::Gateway("order response has no id".into()));
        }
        Ok(order)
    }
}

/// Local gateway for development and tests: orders are minted in-process.
#[derive(Debug, Default)]
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn name(&self) -> &str {
        "offline"
    }

    async fn create_order(&self, req: &OrderRequest) -> Result<GatewayOrder, ServiceError> {
        Ok(GatewayOrder {
            id: format!("order_{}", docket_core::new_id()),
            amount: req.amount,
            currency: req.currency.clone(),
            receipt: Some(req.receipt.clone()),
            status: Some("created".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// Callback signatures
// ---------------------------------------------------------------------------

/// HMAC-SHA256 over `order_id|payment_id`, hex encoded, keyed by the
/// gateway secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ServiceError::Configuration(format!("payment secret: {e}")))?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, order_id: &str, payment_id: &str) -> Result<String, ServiceError> {
        Ok(hex::encode(self.mac(order_id, payment_id)?.finalize().into_bytes()))
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool, ServiceError> {
        let Ok(given) = hex::decode(signature.trim()) else {
            return Ok(false);
        };
        Ok(self.mac(order_id, payment_id)?.verify_slice(&given).is_ok())
    }
}

// ---------------------------------------------------------------------------
// Order ledger
// ---------------------------------------------------------------------------

/// What docket remembers about an order it created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub submission_id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub created_by: String,
    pub created_at: String,
}

/// Gateway orders keyed in KV as `payment/orders/{order_id}`, with
/// `payment/by-submission/{submission_id}` pointing at the latest one.
pub struct OrderLedger {
    kv: Arc<dyn KVStore>,
}

fn order_key(order_id: &str) -> String {
    format!("payment/orders/{order_id}")
}

fn submission_key(submission_id: &str) -> String {
    format!("payment/by-submission/{submission_id}")
}

fn kv_err(e: docket_kv::KVError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

impl OrderLedger {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    pub fn record(&self, order: &OrderRecord) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec(order).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let okey = order_key(&order.order_id);
        let skey = submission_key(&order.submission_id);
        self.kv
            .batch_set(&[(okey.as_str(), bytes.as_slice()), (skey.as_str(), order.order_id.as_bytes())])
            .map_err(kv_err)
    }

    pub fn get(&self, order_id: &str) -> Result<Option<OrderRecord>, ServiceError> {
        self.kv.get_json(&order_key(order_id)).map_err(kv_err)
    }

    /// Latest order created for a submission.
    pub fn latest_for(&self, submission_id: &str) -> Result<Option<OrderRecord>, ServiceError> {
        match self.kv.get(&submission_key(submission_id)).map_err(kv_err)? {
            Some(id) => self.get(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }
}
