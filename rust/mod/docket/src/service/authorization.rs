use docket_core::{new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use docket_sql::Value;

use crate::model::authorization::MAX_STAGE;
use crate::model::{Actor, AuthorizationStep, CreateAuthorizationStep, Subzone};
use crate::service::{require_admin, required, DocketService};
use crate::store::table;

impl DocketService {
    /// Declare who acts at which stage of a service's review.
    pub fn create_authorization_step(
        &self,
        actor: &Actor,
        input: CreateAuthorizationStep,
    ) -> Result<AuthorizationStep, ServiceError> {
        require_admin(actor)?;
        self.get_service(&input.service_id)?;

        if !(1..=MAX_STAGE).contains(&input.stage) {
            return Err(ServiceError::Validation(format!(
                "stage must be between 1 and {MAX_STAGE}, got {}",
                input.stage
            )));
        }
        for id in &input.subzones {
            let known: Option<Subzone> = self
                .store
                .find_record(table::SUBZONES, &[("id", id.as_str().into())])?;
            if known.is_none() {
                return Err(ServiceError::Validation(format!("unknown subzone '{id}'")));
            }
        }

        let step = AuthorizationStep {
            id: new_id(),
            service_id: input.service_id,
            actor: required(&input.actor, "actor")?,
            stage: input.stage,
            subzones: input.subzones,
            supervisor_of: input.supervisor_of.filter(|s| !s.trim().is_empty()),
            can_take_payment: input.can_take_payment,
            can_reject: input.can_reject,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::AUTHORIZATION_STEPS,
            &step.id,
            &step,
            &[
                ("service_id", step.service_id.clone().into()),
                ("stage", i64::from(step.stage).into()),
                ("created_at", step.created_at.clone().into()),
            ],
            "authorization step",
        )?;
        tracing::info!(
            service = %step.service_id,
            actor = %step.actor,
            stage = step.stage,
            "authorization step added"
        );
        Ok(step)
    }

    pub fn list_authorization_steps(
        &self,
        service_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<AuthorizationStep>, ServiceError> {
        let filters: Vec<(&str, Value)> = service_id
            .map(|s| vec![("service_id", s.into())])
            .unwrap_or_default();
        let (items, total) = self.store.list_records(
            table::AUTHORIZATION_STEPS,
            &filters,
            params.limit,
            params.offset,
        )?;
        Ok(ListResult { items, total })
    }
}
