use serde::{Deserialize, Serialize};

use docket_core::{now_rfc3339, ServiceError};

use crate::engine::{PaymentSource, Transition};
use crate::model::{Actor, GatewayStatus, PaymentDetails, PaymentStatus, Submission};
use crate::payment::{to_minor_units, OrderRecord, OrderRequest};
use crate::service::{required, DocketService};

/// Largest difference tolerated between a client-quoted amount and the
/// configured one.
const AMOUNT_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub submission_id: String,
    /// Amount the client expects to pay, in major units. Informational:
    /// the configured amount is always charged.
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub gateway: String,
}

/// Gateway callback fields, as relayed by the client after checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayment {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
    pub submission_id: String,
}

impl DocketService {
    fn owned_submission(&self, actor: &Actor, id: &str) -> Result<Submission, ServiceError> {
        let sub = self.engine.load(id)?;
        if !actor.is_admin() && sub.submitted_by != actor.id {
            return Err(ServiceError::PermissionDenied(format!(
                "submission {id} belongs to another user"
            )));
        }
        Ok(sub)
    }

    /// Open a gateway order for a submission's fee.
    pub async fn create_order(
        &self,
        actor: &Actor,
        input: CreateOrder,
    ) -> Result<OrderCreated, ServiceError> {
        let sub = self.owned_submission(actor, input.submission_id.trim())?;
        if sub.payment_status == PaymentStatus::Success {
            return Err(ServiceError::Conflict(format!(
                "submission {} is already paid",
                sub.id
            )));
        }

        let amount = self.service_amount(&sub.service_id)?;
        if let Some(quoted) = input.amount {
            if (quoted - amount).abs() > AMOUNT_TOLERANCE {
                return Err(ServiceError::Validation(format!(
                    "amount {quoted} does not match the service fee {amount}"
                )));
            }
        }
        let currency = match input.currency.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() && !c.eq_ignore_ascii_case(&self.config.currency) => {
                return Err(ServiceError::Validation(format!(
                    "currency {c} is not accepted; use {}",
                    self.config.currency
                )));
            }
            _ => self.config.currency.clone(),
        };

        if let Some(prev) = self.ledger.latest_for(&sub.id)? {
            tracing::info!(submission = %sub.id, previous = %prev.order_id, "replacing open gateway order");
        }

        let req = OrderRequest {
            amount: to_minor_units(amount)?,
            currency,
            receipt: format!("receipt_{}", sub.id),
        };
        let order = self.gateway.create_order(&req).await?;
        if order.amount != req.amount {
            return Err(ServiceError::Gateway(format!(
                "gateway order {} is for {} instead of {}",
                order.id, order.amount, req.amount
            )));
        }

        self.ledger.record(&OrderRecord {
            order_id: order.id.clone(),
            submission_id: sub.id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            receipt: req.receipt.clone(),
            created_by: actor.id.clone(),
            created_at: now_rfc3339(),
        })?;

        // Attach the open order; payment status itself is unchanged.
        self.engine.apply(
            &sub.id,
            actor,
            Transition::PaymentSettled {
                status: sub.payment_status,
                source: PaymentSource::Gateway,
                details: Some(PaymentDetails {
                    order_id: order.id.clone(),
                    payment_id: None,
                    signature: None,
                    amount: order.amount,
                    currency: order.currency.clone(),
                    status: GatewayStatus::Created,
                    paid_at: None,
                }),
                remark: None,
            },
        )?;

        tracing::info!(
            submission = %sub.id,
            order = %order.id,
            amount = order.amount,
            gateway = self.gateway.name(),
            "payment order created"
        );
        Ok(OrderCreated {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            receipt: req.receipt,
            gateway: self.gateway.name().to_string(),
        })
    }

    /// Check a checkout signature and mark the submission paid.
    ///
    /// Nothing is written unless the signature verifies. Replaying an
    /// already-recorded payment returns the submission unchanged.
    pub fn verify_payment(
        &self,
        actor: &Actor,
        input: VerifyPayment,
    ) -> Result<Submission, ServiceError> {
        let order_id = required(&input.order_id, "orderId")?;
        let payment_id = required(&input.payment_id, "paymentId")?;
        let signature = required(&input.signature, "signature")?;
        let submission_id = required(&input.submission_id, "submissionId")?;

        let sub = self.owned_submission(actor, &submission_id)?;
        let order = self
            .ledger
            .get(&order_id)?
            .filter(|o| o.submission_id == sub.id)
            .ok_or_else(|| {
                ServiceError::PaymentVerification(format!(
                    "order {order_id} was not issued for submission {}",
                    sub.id
                ))
            })?;

        if !self.verifier.verify(&order.order_id, &payment_id, &signature)? {
            tracing::warn!(submission = %sub.id, order = %order.order_id, "payment signature mismatch");
            return Err(ServiceError::PaymentVerification(
                "Invalid payment signature".into(),
            ));
        }

        let already = sub.payment_status == PaymentStatus::Success
            && sub
                .payment_details
                .as_ref()
                .and_then(|d| d.payment_id.as_deref())
                == Some(payment_id.as_str());
        if already {
            return Ok(sub);
        }

        let paid = self.engine.apply(
            &sub.id,
            actor,
            Transition::PaymentSettled {
                status: PaymentStatus::Success,
                source: PaymentSource::Gateway,
                details: Some(PaymentDetails {
                    order_id: order.order_id.clone(),
                    payment_id: Some(payment_id),
                    signature: Some(signature.to_ascii_lowercase()),
                    amount: order.amount,
                    currency: order.currency,
                    status: GatewayStatus::Completed,
                    paid_at: Some(now_rfc3339()),
                }),
                remark: None,
            },
        )?;
        tracing::info!(submission = %paid.id, order = %order.order_id, "payment verified");
        Ok(paid)
    }
}
