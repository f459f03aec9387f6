use std::sync::Arc;

use docket_core::{is_valid_id, now_rfc3339, ServiceError};
use docket_sql::Value;

use crate::model::{
    Actor, AuditEntry, AuthorizationStep, PaymentDetails, PaymentStatus, Role, ServiceConfig,
    Submission, SubmissionStatus,
};
use crate::store::{table, DocketStore};

pub const NO_REMARK: &str = "No remark provided";

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// Where a payment status change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSource {
    /// Gateway callback whose signature has already been verified.
    Gateway,
    /// Staff correcting a stuck or missed callback.
    Manual,
}

/// Every change to a submission after creation goes through one of these.
#[derive(Debug, Clone)]
pub enum Transition {
    Review {
        decision: Decision,
        remark: Option<String>,
    },
    PaymentSettled {
        status: PaymentStatus,
        source: PaymentSource,
        details: Option<PaymentDetails>,
        remark: Option<String>,
    },
    /// Admin-only jump to a later status. Skips the payment gate and the
    /// stage rules but never leaves a terminal state or moves backwards.
    Override {
        status: SubmissionStatus,
        remark: Option<String>,
    },
}

/// Per-service rules consulted by [`plan`].
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Configured authorization sequence. Empty means the built-in role rule.
    pub steps: Vec<AuthorizationStep>,
    /// Whether ACCEPT needs `paymentStatus = success`.
    pub payment_required: bool,
}

impl Policy {
    fn steps_at(&self, stage: u8) -> impl Iterator<Item = &AuthorizationStep> {
        self.steps.iter().filter(move |s| s.stage == stage)
    }

    fn has_stage(&self, stage: u8) -> bool {
        self.steps_at(stage).next().is_some()
    }
}

/// The fields a transition writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: SubmissionStatus,
    pub payment_status: PaymentStatus,
    pub payment_details: Option<PaymentDetails>,
    pub audit: Option<AuditEntry>,
}

impl Outcome {
    fn unchanged(sub: &Submission) -> Self {
        Self {
            status: sub.status,
            payment_status: sub.payment_status,
            payment_details: sub.payment_details.clone(),
            audit: None,
        }
    }

    /// Whether applying this outcome would leave `sub` as it is.
    pub fn is_noop(&self, sub: &Submission) -> bool {
        self.audit.is_none()
            && self.status == sub.status
            && self.payment_status == sub.payment_status
            && self.payment_details == sub.payment_details
    }
}

// ---------------------------------------------------------------------------
// plan: the pure transition function
// ---------------------------------------------------------------------------

/// Decide what `transition` does to `sub` when requested by `actor`.
///
/// No I/O. Errors leave the submission untouched.
pub fn plan(
    sub: &Submission,
    actor: &Actor,
    transition: &Transition,
    policy: &Policy,
    now: &str,
) -> Result<Outcome, ServiceError> {
    match transition {
        Transition::Review { decision, remark } => {
            plan_review(sub, actor, *decision, remark.as_deref(), policy, now)
        }
        Transition::PaymentSettled {
            status,
            source,
            details,
            remark,
        } => plan_payment(sub, actor, *status, *source, details.as_ref(), remark.as_deref(), policy, now),
        Transition::Override { status, remark } => {
            plan_override(sub, actor, *status, remark.as_deref(), now)
        }
    }
}

fn plan_review(
    sub: &Submission,
    actor: &Actor,
    decision: Decision,
    remark: Option<&str>,
    policy: &Policy,
    now: &str,
) -> Result<Outcome, ServiceError> {
    let stage = match sub.status.stage() {
        Some(stage) => stage,
        None => {
            return Err(ServiceError::Conflict(format!(
                "submission {} is already {}",
                sub.id, sub.status
            )));
        }
    };
    if !actor.role.is_reviewer() {
        return Err(ServiceError::PermissionDenied(format!(
            "role {} cannot review submissions",
            actor.role
        )));
    }

    let remark = remark.map(str::trim).filter(|r| !r.is_empty());
    if decision == Decision::Reject && remark.is_none() {
        return Err(ServiceError::Validation("a remark is required to reject".into()));
    }
    if decision == Decision::Accept
        && policy.payment_required
        && sub.payment_status != PaymentStatus::Success
    {
        return Err(ServiceError::Validation(format!(
            "payment for submission {} is {}; it must succeed before review",
            sub.id, sub.payment_status
        )));
    }

    let next = if policy.steps.is_empty() {
        by_role(actor, stage, decision)?
    } else {
        by_steps(actor, stage, decision, policy)?
    };

    let mut out = Outcome::unchanged(sub);
    out.status = next;
    out.audit = Some(audit(
        actor,
        format!("Status updated to {next}"),
        remark,
        now,
    ));
    Ok(out)
}

/// Built-in rule for services without an authorization sequence:
/// `auth_1` moves stage 1 on to stage 2, any other reviewer completes.
/// Stage 2 belongs to `auth_2` and admins.
fn by_role(actor: &Actor, stage: u8, decision: Decision) -> Result<SubmissionStatus, ServiceError> {
    if stage == 2 && actor.role == Role::Auth1 {
        return Err(ServiceError::PermissionDenied(
            "stage 2 is reviewed by auth_2 or admin".into(),
        ));
    }
    Ok(match (decision, stage, actor.role) {
        (Decision::Reject, _, _) => SubmissionStatus::Rejected,
        (Decision::Accept, 1, Role::Auth1) => SubmissionStatus::Stage2Pending,
        (Decision::Accept, _, _) => SubmissionStatus::Completed,
    })
}

fn by_steps(
    actor: &Actor,
    stage: u8,
    decision: Decision,
    policy: &Policy,
) -> Result<SubmissionStatus, ServiceError> {
    if !actor.is_admin() {
        let held: Vec<&AuthorizationStep> =
            policy.steps_at(stage).filter(|s| s.matches(actor)).collect();
        if held.is_empty() {
            return Err(ServiceError::PermissionDenied(format!(
                "{} ({}) holds no authorization step at stage {stage}",
                actor.id, actor.role
            )));
        }
        if decision == Decision::Reject && !held.iter().any(|s| s.can_reject) {
            return Err(ServiceError::PermissionDenied(format!(
                "{} may not reject at stage {stage}",
                actor.id
            )));
        }
    }
    Ok(match decision {
        Decision::Reject => SubmissionStatus::Rejected,
        Decision::Accept if stage == 1 && policy.has_stage(2) => SubmissionStatus::Stage2Pending,
        Decision::Accept => SubmissionStatus::Completed,
    })
}

#[allow(clippy::too_many_arguments)]
fn plan_payment(
    sub: &Submission,
    actor: &Actor,
    status: PaymentStatus,
    source: PaymentSource,
    details: Option<&PaymentDetails>,
    remark: Option<&str>,
    policy: &Policy,
    now: &str,
) -> Result<Outcome, ServiceError> {
    if source == PaymentSource::Manual && !may_take_payment(actor, policy) {
        return Err(ServiceError::PermissionDenied(format!(
            "role {} cannot set payment status",
            actor.role
        )));
    }

    let mut out = Outcome::unchanged(sub);
    out.payment_status = status;
    if let Some(d) = details {
        out.payment_details = Some(d.clone());
    }
    if status != sub.payment_status {
        let remark = remark.map(str::trim).filter(|r| !r.is_empty());
        out.audit = Some(audit(
            actor,
            format!("Payment status updated to {status}"),
            remark,
            now,
        ));
    }
    Ok(out)
}

fn may_take_payment(actor: &Actor, policy: &Policy) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Auth1 | Role::Auth2 if policy.steps.is_empty() => true,
        Role::Auth1 | Role::Auth2 => policy
            .steps
            .iter()
            .any(|s| s.can_take_payment && s.matches(actor)),
        Role::Citizen => false,
    }
}

fn plan_override(
    sub: &Submission,
    actor: &Actor,
    target: SubmissionStatus,
    remark: Option<&str>,
    now: &str,
) -> Result<Outcome, ServiceError> {
    if !actor.is_admin() {
        return Err(ServiceError::PermissionDenied(
            "only an admin can override a submission's status".into(),
        ));
    }
    if sub.status.is_terminal() {
        return Err(ServiceError::Conflict(format!(
            "submission {} is already {}",
            sub.id, sub.status
        )));
    }
    if target.rank() <= sub.status.rank() {
        return Err(ServiceError::Validation(format!(
            "cannot move submission from {} to {target}",
            sub.status
        )));
    }

    let remark = remark.map(str::trim).filter(|r| !r.is_empty());
    let mut out = Outcome::unchanged(sub);
    out.status = target;
    out.audit = Some(audit(
        actor,
        format!("Status overridden to {target}"),
        remark,
        now,
    ));
    Ok(out)
}

fn audit(actor: &Actor, action: String, remark: Option<&str>, now: &str) -> AuditEntry {
    AuditEntry {
        user: actor.id.clone(),
        role: actor.role.as_str().to_string(),
        action,
        remark: remark.unwrap_or(NO_REMARK).to_string(),
        processed_at: now.to_string(),
    }
}

// ---------------------------------------------------------------------------
// StatusEngine
// ---------------------------------------------------------------------------

/// Columns of the submissions table that change with a transition.
pub(crate) fn transition_columns(sub: &Submission) -> Vec<(&'static str, Value)> {
    vec![
        ("status", sub.status.as_str().into()),
        ("payment_status", sub.payment_status.as_str().into()),
        ("version", sub.version.into()),
    ]
}

/// Loads a submission, plans a transition and writes it back with a
/// compare-and-swap on `version`.
pub struct StatusEngine {
    store: Arc<DocketStore>,
}

impl StatusEngine {
    pub fn new(store: Arc<DocketStore>) -> Self {
        Self { store }
    }

    /// Load a submission, failing fast on an id that cannot exist.
    pub fn load(&self, id: &str) -> Result<Submission, ServiceError> {
        if !is_valid_id(id) {
            return Err(ServiceError::Validation(format!("malformed submission id {id:?}")));
        }
        self.store.get_record(table::SUBMISSIONS, id)
    }

    /// Authorization steps and payment requirement for a service.
    ///
    /// A service without a config is treated as paid.
    pub fn policy_for(&self, service_id: &str) -> Result<Policy, ServiceError> {
        let steps = self.store.all_records(
            table::AUTHORIZATION_STEPS,
            &[("service_id", service_id.into())],
            "stage ASC, created_at ASC",
        )?;
        let config: Option<ServiceConfig> = self
            .store
            .find_record(table::SERVICE_CONFIGS, &[("service_id", service_id.into())])?;
        Ok(Policy {
            steps,
            payment_required: config.map(|c| c.is_paid_service).unwrap_or(true),
        })
    }

    /// Apply `transition` to submission `id` on behalf of `actor`.
    pub fn apply(
        &self,
        id: &str,
        actor: &Actor,
        transition: Transition,
    ) -> Result<Submission, ServiceError> {
        self.apply_checked(id, actor, transition, None)
    }

    /// Like [`apply`](Self::apply), but the transition was chosen to reach
    /// `target`. Planned against the record as stored now, it must still land
    /// there; otherwise someone moved the submission first and this yields
    /// `Conflict`.
    pub fn apply_towards(
        &self,
        id: &str,
        actor: &Actor,
        transition: Transition,
        target: SubmissionStatus,
    ) -> Result<Submission, ServiceError> {
        self.apply_checked(id, actor, transition, Some(target))
    }

    fn apply_checked(
        &self,
        id: &str,
        actor: &Actor,
        transition: Transition,
        target: Option<SubmissionStatus>,
    ) -> Result<Submission, ServiceError> {
        let mut sub = self.load(id)?;
        let policy = self.policy_for(&sub.service_id)?;
        let now = now_rfc3339();

        let out = plan(&sub, actor, &transition, &policy, &now)?;
        if let Some(target) = target {
            if out.status != target {
                tracing::warn!(submission = %sub.id, %target, planned = %out.status, "stale status request");
                return Err(ServiceError::Conflict(format!(
                    "submission {} is now {}; it can no longer be moved to {target}",
                    sub.id, sub.status
                )));
            }
        }
        if out.is_noop(&sub) {
            tracing::debug!(submission = %sub.id, "transition left submission unchanged");
            return Ok(sub);
        }

        let from = sub.status;
        let expected = sub.version;
        sub.status = out.status;
        sub.payment_status = out.payment_status;
        sub.payment_details = out.payment_details;
        if let Some(entry) = out.audit {
            sub.processed_by.push(entry);
        }
        sub.version += 1;
        sub.updated_at = now;

        let written = self.store.update_record_cas(
            table::SUBMISSIONS,
            &sub.id,
            expected,
            &sub,
            &transition_columns(&sub),
        )?;
        if !written {
            tracing::warn!(submission = %sub.id, version = expected, "lost submission update race");
            return Err(ServiceError::Conflict(format!(
                "submission {} was modified concurrently; reload and retry",
                sub.id
            )));
        }

        tracing::info!(
            submission = %sub.id,
            from = %from,
            to = %sub.status,
            payment = %sub.payment_status,
            actor = %actor.id,
            role = %actor.role,
            "submission transition applied"
        );
        Ok(sub)
    }
}
