use docket_core::{merge_patch, new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use docket_sql::Value;

use crate::model::{
    Actor, Availability, CreateService, CreateServiceConfig, CreateSubzone, FormAvailability,
    Service, ServiceConfig, SetAvailability, Subzone,
};
use crate::model::service::{table_name_for, DEFAULT_TIME_LIMIT_DAYS};
use crate::service::{require_admin, required, DocketService};
use crate::store::table;

impl DocketService {
    // ── Services ──

    pub fn create_service(&self, actor: &Actor, input: CreateService) -> Result<Service, ServiceError> {
        require_admin(actor)?;
        let name = required(&input.name, "service name")?;
        let table_name = match input.table_name.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => table_name_for(&name),
        };
        if table_name.is_empty() {
            return Err(ServiceError::Validation(format!(
                "cannot derive a table name from {name:?}"
            )));
        }
        let time_limit = input.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_DAYS);
        if time_limit == 0 {
            return Err(ServiceError::Validation("time limit must be at least one day".into()));
        }

        let service = Service {
            id: new_id(),
            name,
            table_name,
            time_limit,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::SERVICES,
            &service.id,
            &service,
            &[
                ("name", service.name.clone().into()),
                ("created_at", service.created_at.clone().into()),
            ],
            "service",
        )?;
        tracing::info!(service = %service.id, name = %service.name, "service created");
        Ok(service)
    }

    pub fn get_service(&self, id: &str) -> Result<Service, ServiceError> {
        self.store.get_record(table::SERVICES, id)
    }

    pub fn list_services(&self, params: &ListParams) -> Result<ListResult<Service>, ServiceError> {
        let (items, total) = self
            .store
            .list_records(table::SERVICES, &[], params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }

    // ── Service configs ──

    pub fn create_service_config(
        &self,
        actor: &Actor,
        input: CreateServiceConfig,
    ) -> Result<ServiceConfig, ServiceError> {
        require_admin(actor)?;
        self.get_service(&input.service_id)?;

        let now = now_rfc3339();
        let config = ServiceConfig {
            id: new_id(),
            service_id: input.service_id,
            is_paid_service: input.is_paid_service,
            rate_of_service: input.rate_of_service,
            custom_rate: input.custom_rate,
            certificate_data: input.certificate_data,
            created_at: now.clone(),
            updated_at: now,
        };
        check_pricing(&config)?;

        self.store.insert_record(
            table::SERVICE_CONFIGS,
            &config.id,
            &config,
            &[
                ("service_id", config.service_id.clone().into()),
                ("created_at", config.created_at.clone().into()),
            ],
            "config for this service",
        )?;
        Ok(config)
    }

    /// Update a config with JSON merge-patch. `id`, `serviceId` and
    /// `createdAt` are kept.
    pub fn update_service_config(
        &self,
        actor: &Actor,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<ServiceConfig, ServiceError> {
        require_admin(actor)?;
        let current: ServiceConfig = self.store.get_record(table::SERVICE_CONFIGS, id)?;
        let now = now_rfc3339();

        let mut base =
            serde_json::to_value(&current).map_err(|e| ServiceError::Internal(e.to_string()))?;
        merge_patch(&mut base, &patch);
        base["id"] = serde_json::json!(current.id);
        base["serviceId"] = serde_json::json!(current.service_id);
        base["createdAt"] = serde_json::json!(current.created_at);
        base["updatedAt"] = serde_json::json!(now);

        let updated: ServiceConfig = serde_json::from_value(base)
            .map_err(|e| ServiceError::Validation(format!("invalid service config: {e}")))?;
        check_pricing(&updated)?;

        self.store.update_record(table::SERVICE_CONFIGS, id, &updated, &[])?;
        Ok(updated)
    }

    /// Config of a service, `NotFound` when none exists.
    pub fn service_config(&self, service_id: &str) -> Result<ServiceConfig, ServiceError> {
        self.store
            .find_record(table::SERVICE_CONFIGS, &[("service_id", service_id.into())])?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no configuration for service '{service_id}'"))
            })
    }

    pub fn list_service_configs(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<ServiceConfig>, ServiceError> {
        let (items, total) =
            self.store
                .list_records(table::SERVICE_CONFIGS, &[], params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }

    /// Amount payable for a service.
    pub fn service_amount(&self, service_id: &str) -> Result<f64, ServiceError> {
        let config = self.service_config(service_id)?;
        if !config.is_paid_service {
            return Err(ServiceError::Validation(format!(
                "service '{service_id}' is free"
            )));
        }
        let amount = config.effective_amount();
        if !(amount > 0.0) {
            return Err(ServiceError::Validation(format!(
                "service '{service_id}' has no positive rate configured"
            )));
        }
        Ok(amount)
    }

    /// Raw certificate template of a service.
    pub fn certificate_template(&self, service_id: &str) -> Result<String, ServiceError> {
        let config = self.service_config(service_id)?;
        if config.certificate_data.trim().is_empty() {
            return Err(ServiceError::Configuration(format!(
                "service '{service_id}' has no certificate template"
            )));
        }
        Ok(config.certificate_data)
    }

    // ── Availability ──

    pub fn set_availability(
        &self,
        actor: &Actor,
        input: SetAvailability,
    ) -> Result<FormAvailability, ServiceError> {
        require_admin(actor)?;
        self.get_service(&input.service_id)?;

        let record = FormAvailability {
            id: new_id(),
            service_id: input.service_id,
            status: input.status,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::FORM_AVAILABILITY,
            &record.id,
            &record,
            &[
                ("service_id", record.service_id.clone().into()),
                ("created_at", record.created_at.clone().into()),
            ],
            "availability record",
        )?;
        tracing::info!(service = %record.service_id, status = %record.status, "form availability set");
        Ok(record)
    }

    /// Whether a service accepts submissions. The newest record wins;
    /// no record means disabled.
    pub fn availability(&self, service_id: &str) -> Result<Availability, ServiceError> {
        self.get_service(service_id)?;
        let latest: Option<FormAvailability> = self
            .store
            .find_record(table::FORM_AVAILABILITY, &[("service_id", service_id.into())])?;
        Ok(latest.map(|r| r.status).unwrap_or(Availability::Disabled))
    }

    pub fn list_availability(
        &self,
        service_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<FormAvailability>, ServiceError> {
        let filters: Vec<(&str, Value)> = service_id
            .map(|s| vec![("service_id", s.into())])
            .unwrap_or_default();
        let (items, total) = self.store.list_records(
            table::FORM_AVAILABILITY,
            &filters,
            params.limit,
            params.offset,
        )?;
        Ok(ListResult { items, total })
    }

    // ── Subzones ──

    pub fn create_subzone(&self, actor: &Actor, input: CreateSubzone) -> Result<Subzone, ServiceError> {
        require_admin(actor)?;
        let subzone = Subzone {
            id: new_id(),
            zone_id: required(&input.zone_id, "zone id")?,
            name: required(&input.name, "subzone name")?,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::SUBZONES,
            &subzone.id,
            &subzone,
            &[
                ("zone_id", subzone.zone_id.clone().into()),
                ("created_at", subzone.created_at.clone().into()),
            ],
            "subzone",
        )?;
        Ok(subzone)
    }

    pub fn list_subzones(
        &self,
        zone_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<Subzone>, ServiceError> {
        let filters: Vec<(&str, Value)> = zone_id
            .map(|z| vec![("zone_id", z.into())])
            .unwrap_or_default();
        let (items, total) =
            self.store
                .list_records(table::SUBZONES, &filters, params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }
}

fn check_pricing(config: &ServiceConfig) -> Result<(), ServiceError> {
    let rates = [Some(config.rate_of_service), config.custom_rate];
    if rates.iter().flatten().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(ServiceError::Validation("rates cannot be negative".into()));
    }
    if config.is_paid_service && !(config.effective_amount() > 0.0) {
        return Err(ServiceError::Validation(
            "a paid service needs a positive rate".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::model::{Availability, CreateService, CreateServiceConfig, SetAvailability};
    use crate::service::testing::*;
    use docket_core::{ListParams, ServiceError};

    fn create(fx: &Fixture, name: &str) -> String {
        fx.create_service(
            &admin(),
            CreateService {
                name: name.into(),
                table_name: None,
                time_limit: None,
            },
        )
        .unwrap()
        .id
    }

    fn config(service_id: &str, paid: bool, rate: f64, custom: Option<f64>) -> CreateServiceConfig {
        CreateServiceConfig {
            service_id: service_id.into(),
            is_paid_service: paid,
            rate_of_service: rate,
            custom_rate: custom,
            certificate_data: "Certified {{Name}}".into(),
        }
    }

    #[test]
    fn create_and_list_services() {
        let fx = service();
        let id = create(&fx, "Birth Certificate");
        let svc = fx.get_service(&id).unwrap();
        assert_eq!(svc.table_name, "birth_certificate");
        assert_eq!(svc.time_limit, 30);

        create(&fx, "Income Certificate");
        let page = fx.list_services(&ListParams::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Income Certificate");
    }

    #[test]
    fn services_are_admin_only_and_unique() {
        let fx = service();
        let input = || CreateService {
            name: "Dup".into(),
            table_name: None,
            time_limit: Some(7),
        };
        assert!(matches!(
            fx.create_service(&auth1(), input()),
            Err(ServiceError::PermissionDenied(_))
        ));
        fx.create_service(&admin(), input()).unwrap();
        assert!(matches!(
            fx.create_service(&admin(), input()),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn amount_prefers_custom_rate() {
        let fx = service();
        let id = create(&fx, "Caste Certificate");
        assert!(matches!(fx.service_amount(&id), Err(ServiceError::NotFound(_))));

        fx.create_service_config(&admin(), config(&id, true, 250.0, Some(300.0)))
            .unwrap();
        assert_eq!(fx.service_amount(&id).unwrap(), 300.0);
        assert!(matches!(
            fx.create_service_config(&admin(), config(&id, true, 1.0, None)),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn free_or_zero_rate_has_no_amount() {
        let fx = service();
        let free = create(&fx, "Free");
        fx.create_service_config(&admin(), config(&free, false, 0.0, None))
            .unwrap();
        assert!(matches!(fx.service_amount(&free), Err(ServiceError::Validation(_))));

        let broken = create(&fx, "Broken");
        assert!(matches!(
            fx.create_service_config(&admin(), config(&broken, true, 0.0, None)),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn patch_config_keeps_identity() {
        let fx = service();
        let id = create(&fx, "Residence");
        let cfg = fx
            .create_service_config(&admin(), config(&id, true, 100.0, None))
            .unwrap();
        let updated = fx
            .update_service_config(
                &admin(),
                &cfg.id,
                serde_json::json!({"customRate": 150.0, "serviceId": "elsewhere"}),
            )
            .unwrap();
        assert_eq!(updated.service_id, id);
        assert_eq!(updated.custom_rate, Some(150.0));
        assert_eq!(fx.service_amount(&id).unwrap(), 150.0);

        assert!(fx
            .update_service_config(&admin(), &cfg.id, serde_json::json!({"rateOfService": -1}))
            .is_err());
    }

    #[test]
    fn template_fetch() {
        let fx = service();
        let id = create(&fx, "Tmpl");
        let mut input = config(&id, false, 0.0, None);
        input.certificate_data = "  ".into();
        fx.create_service_config(&admin(), input).unwrap();
        assert!(matches!(
            fx.certificate_template(&id),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn availability_defaults_to_disabled_and_latest_wins() {
        let fx = service();
        let id = create(&fx, "Avail");
        assert_eq!(fx.availability(&id).unwrap(), Availability::Disabled);

        for status in [Availability::Enabled, Availability::Disabled, Availability::Enabled] {
            fx.set_availability(
                &admin(),
                SetAvailability {
                    service_id: id.clone(),
                    status,
                },
            )
            .unwrap();
        }
        assert_eq!(fx.availability(&id).unwrap(), Availability::Enabled);
        assert_eq!(
            fx.list_availability(Some(&id), &ListParams::default()).unwrap().total,
            3
        );
        assert!(matches!(fx.availability("missing"), Err(ServiceError::NotFound(_))));
    }
}
