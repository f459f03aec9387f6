use std::collections::HashMap;

use serde::Serialize;

use docket_core::{new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use docket_sql::Value;

use crate::model::{
    Actor, CreateFormField, CreateOptionList, CreateOptionListEntry, EntryCreated, FieldType,
    FormField, OptionItem, OptionList, OptionListEntry,
};
use crate::schema::{FormSchema, UploadRefs};
use crate::service::{require_admin, required, DocketService};
use crate::store::table;

/// Attempts at appending to an option list before giving up on a version race.
const SYNC_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct FieldTypeInfo {
    pub value: &'static str,
    pub label: &'static str,
}

/// The field types a form may use.
pub fn field_types() -> Vec<FieldTypeInfo> {
    FieldType::ALL
        .iter()
        .map(|t| FieldTypeInfo {
            value: t.as_str(),
            label: t.label(),
        })
        .collect()
}

impl DocketService {
    // ── Form fields ──

    pub fn create_form_field(
        &self,
        actor: &Actor,
        input: CreateFormField,
    ) -> Result<FormField, ServiceError> {
        require_admin(actor)?;
        self.get_service(&input.service_id)?;

        let label = required(&input.label, "label")?;
        let field_name = match input.field_name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => label.clone(),
        };
        let kind = FieldType::from_str(&input.field_type).ok_or_else(|| {
            ServiceError::Validation(format!("unknown field type {:?}", input.field_type))
        })?;

        if let Some(list_id) = input.option_list_id.as_deref() {
            let list: OptionList = self.store.get_record(table::OPTION_LISTS, list_id).map_err(|e| match e {
                ServiceError::NotFound(m) => ServiceError::Validation(m),
                other => other,
            })?;
            if kind.needs_options() && list.options.is_empty() {
                return Err(ServiceError::Validation(format!(
                    "option list {:?} is empty",
                    list.name
                )));
            }
        } else if kind.needs_options() {
            return Err(ServiceError::Validation(format!(
                "{kind} field {field_name:?} needs an option list"
            )));
        }
        if let (Some(min), Some(max)) = (input.min, input.max) {
            if min > max {
                return Err(ServiceError::Validation(format!(
                    "min {min} is greater than max {max}"
                )));
            }
        }

        let position = match input.position {
            Some(p) => p,
            None => {
                self.store
                    .max_i64(
                        table::FORM_FIELDS,
                        "position",
                        &[("service_id", input.service_id.as_str().into())],
                    )?
                    .unwrap_or(0)
                    + 1
            }
        };

        let field = FormField {
            id: new_id(),
            service_id: input.service_id,
            field_name,
            field_type: kind.as_str().to_string(),
            label,
            required: input.required,
            min: input.min,
            max: input.max,
            option_list_id: input.option_list_id,
            help_text: input.help_text,
            notes: input.notes,
            position,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::FORM_FIELDS,
            &field.id,
            &field,
            &[
                ("service_id", field.service_id.clone().into()),
                ("field_name", field.field_name.clone().into()),
                ("position", field.position.into()),
                ("created_at", field.created_at.clone().into()),
            ],
            "field with this name",
        )?;
        Ok(field)
    }

    /// Fields of a service in render order.
    pub fn fields_for(&self, service_id: &str) -> Result<Vec<FormField>, ServiceError> {
        self.store.all_records(
            table::FORM_FIELDS,
            &[("service_id", service_id.into())],
            "position ASC, created_at ASC",
        )
    }

    pub fn list_form_fields(
        &self,
        service_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<FormField>, ServiceError> {
        let filters: Vec<(&str, Value)> = service_id
            .map(|s| vec![("service_id", s.into())])
            .unwrap_or_default();
        let (items, total) =
            self.store
                .list_records(table::FORM_FIELDS, &filters, params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }

    /// The citizen-facing form of a service.
    pub fn form_schema(&self, service_id: &str) -> Result<FormSchema, ServiceError> {
        self.get_service(service_id)?;
        let fields = self.fields_for(service_id)?;

        let mut lists = HashMap::new();
        for list_id in fields.iter().filter_map(|f| f.option_list_id.as_deref()) {
            if lists.contains_key(list_id) {
                continue;
            }
            match self.store.get_record::<OptionList>(table::OPTION_LISTS, list_id) {
                Ok(list) => {
                    lists.insert(list_id.to_string(), list);
                }
                // resolve() reports the dangling reference
                Err(ServiceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(FormSchema::resolve(service_id, fields, &lists)?.with_uploads(UploadRefs {
            base: self.config.public_upload_base.clone(),
            policy: self.config.upload_policy.clone(),
        }))
    }

    // ── Option lists ──

    pub fn create_option_list(
        &self,
        actor: &Actor,
        input: CreateOptionList,
    ) -> Result<OptionList, ServiceError> {
        require_admin(actor)?;
        let now = now_rfc3339();
        let mut list = OptionList {
            id: new_id(),
            name: required(&input.name, "option list name")?,
            options: Vec::new(),
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        for item in input.options {
            list.add_option(normalize(item.label, Some(item.value))?);
        }

        self.store.insert_record(
            table::OPTION_LISTS,
            &list.id,
            &list,
            &[
                ("name", list.name.clone().into()),
                ("version", list.version.into()),
                ("created_at", list.created_at.clone().into()),
            ],
            "option list",
        )?;
        Ok(list)
    }

    pub fn get_option_list(&self, id: &str) -> Result<OptionList, ServiceError> {
        self.store.get_record(table::OPTION_LISTS, id)
    }

    pub fn list_option_lists(&self, params: &ListParams) -> Result<ListResult<OptionList>, ServiceError> {
        let (items, total) =
            self.store
                .list_records(table::OPTION_LISTS, &[], params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }

    // ── Option list entries ──

    /// Store an entry, then mirror it into the parent list.
    ///
    /// The entry is kept even if mirroring fails; the result says so and
    /// [`DocketService::resync_option_list`] retries.
    pub fn create_option_list_entry(
        &self,
        actor: &Actor,
        input: CreateOptionListEntry,
    ) -> Result<EntryCreated, ServiceError> {
        require_admin(actor)?;
        self.get_option_list(&input.list_id)?;
        let item = normalize(input.label, input.value)?;

        let entry = OptionListEntry {
            id: new_id(),
            list_id: input.list_id,
            label: item.label,
            value: item.value,
            created_at: now_rfc3339(),
        };
        self.store.insert_record(
            table::OPTION_LIST_ENTRIES,
            &entry.id,
            &entry,
            &[
                ("list_id", entry.list_id.clone().into()),
                ("created_at", entry.created_at.clone().into()),
            ],
            "option list entry",
        )?;

        let synced = match self.sync_option(&entry.list_id, entry.as_option()) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(list = %entry.list_id, entry = %entry.id, error = %e, "option list sync failed");
                false
            }
        };
        Ok(EntryCreated { entry, synced })
    }

    pub fn list_option_list_entries(
        &self,
        list_id: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<OptionListEntry>, ServiceError> {
        let filters: Vec<(&str, Value)> = list_id
            .map(|l| vec![("list_id", l.into())])
            .unwrap_or_default();
        let (items, total) = self.store.list_records(
            table::OPTION_LIST_ENTRIES,
            &filters,
            params.limit,
            params.offset,
        )?;
        Ok(ListResult { items, total })
    }

    /// Re-apply every entry of a list to the list itself.
    pub fn resync_option_list(&self, actor: &Actor, list_id: &str) -> Result<OptionList, ServiceError> {
        require_admin(actor)?;
        self.get_option_list(list_id)?;
        let entries: Vec<OptionListEntry> = self.store.all_records(
            table::OPTION_LIST_ENTRIES,
            &[("list_id", list_id.into())],
            "created_at ASC, rowid ASC",
        )?;
        let mut added = 0;
        for entry in &entries {
            if self.sync_option(list_id, entry.as_option())? {
                added += 1;
            }
        }
        tracing::info!(list = %list_id, entries = entries.len(), added, "option list resynced");
        self.get_option_list(list_id)
    }

    /// Append `item` to the list unless present. Returns whether it was added.
    fn sync_option(&self, list_id: &str, item: OptionItem) -> Result<bool, ServiceError> {
        for _ in 0..SYNC_ATTEMPTS {
            let mut list = self.get_option_list(list_id)?;
            if !list.add_option(item.clone()) {
                return Ok(false);
            }
            let expected = list.version;
            list.version += 1;
            list.updated_at = now_rfc3339();
            if self.store.update_record_cas(
                table::OPTION_LISTS,
                list_id,
                expected,
                &list,
                &[("version", list.version.into())],
            )? {
                return Ok(true);
            }
        }
        Err(ServiceError::Conflict(format!(
            "option list '{list_id}' kept changing; retry the sync"
        )))
    }
}

fn normalize(label: String, value: Option<String>) -> Result<OptionItem, ServiceError> {
    let label = required(&label, "option label")?;
    let value = match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => label.clone(),
    };
    Ok(OptionItem { label, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateService;
    use crate::service::testing::*;

    fn new_service(fx: &Fixture) -> String {
        fx.create_service(
            &admin(),
            CreateService {
                name: "Trade Licence".into(),
                table_name: None,
                time_limit: None,
            },
        )
        .unwrap()
        .id
    }

    fn new_list(fx: &Fixture, options: &[(&str, &str)]) -> OptionList {
        fx.create_option_list(
            &admin(),
            CreateOptionList {
                name: format!("list-{}", new_id()),
                options: options
                    .iter()
                    .map(|(l, v)| OptionItem {
                        label: l.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            },
        )
        .unwrap()
    }

    fn field(service_id: &str, label: &str, ty: &str) -> CreateFormField {
        CreateFormField {
            service_id: service_id.into(),
            field_name: None,
            field_type: ty.into(),
            label: label.into(),
            required: false,
            min: None,
            max: None,
            option_list_id: None,
            help_text: None,
            notes: None,
            position: None,
        }
    }

    #[test]
    fn catalogue_has_ten_types() {
        let types = field_types();
        assert_eq!(types.len(), 10);
        assert_eq!(types[0].value, "INPUT-TEXT");
    }

    #[test]
    fn fields_append_in_order() {
        let fx = service();
        let svc = new_service(&fx);
        let a = fx.create_form_field(&admin(), field(&svc, "Name", "text")).unwrap();
        let b = fx.create_form_field(&admin(), field(&svc, "Date of Birth", "DATE")).unwrap();
        assert_eq!(a.position, 1);
        assert_eq!(b.position, 2);
        assert_eq!(a.field_type, "INPUT-TEXT");
        assert_eq!(a.field_name, "Name");

        let mut first = field(&svc, "Email", "INPUT-EMAIL");
        first.position = Some(0);
        fx.create_form_field(&admin(), first).unwrap();

        let schema = fx.form_schema(&svc).unwrap();
        let names: Vec<&str> = schema.widgets().iter().map(|w| w.field_name.as_str()).collect();
        assert_eq!(names, vec!["Email", "Name", "Date of Birth"]);

        assert!(matches!(
            fx.create_form_field(&admin(), field(&svc, "Name", "TEXTAREA")),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn field_validation() {
        let fx = service();
        let svc = new_service(&fx);
        assert!(matches!(
            fx.create_form_field(&admin(), field(&svc, "X", "SLIDER")),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            fx.create_form_field(&admin(), field(&svc, "District", "SELECT")),
            Err(ServiceError::Validation(_))
        ));
        let mut bounds = field(&svc, "Age", "NUMBER");
        bounds.min = Some(10.0);
        bounds.max = Some(1.0);
        assert!(fx.create_form_field(&admin(), bounds).is_err());

        let empty = new_list(&fx, &[]);
        let mut sel = field(&svc, "District", "SELECT");
        sel.option_list_id = Some(empty.id);
        assert!(fx.create_form_field(&admin(), sel).is_err());

        assert!(matches!(
            fx.create_form_field(&auth1(), field(&svc, "Y", "TEXT")),
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[test]
    fn list_creation_dedups() {
        let fx = service();
        let list = new_list(&fx, &[("North", "N"), ("North", "N"), ("South", "")]);
        assert_eq!(list.options.len(), 2);
        assert_eq!(list.options[1].value, "South");
    }

    #[test]
    fn entries_mirror_into_list_once() {
        let fx = service();
        let list = new_list(&fx, &[]);
        for _ in 0..2 {
            let created = fx
                .create_option_list_entry(
                    &admin(),
                    CreateOptionListEntry {
                        list_id: list.id.clone(),
                        label: "East".into(),
                        value: Some("E".into()),
                    },
                )
                .unwrap();
            assert!(created.synced);
        }

        let stored = fx.get_option_list(&list.id).unwrap();
        assert_eq!(stored.options, vec![OptionItem { label: "East".into(), value: "E".into() }]);
        assert_eq!(stored.version, 1);
        assert_eq!(
            fx.list_option_list_entries(Some(&list.id), &ListParams::default())
                .unwrap()
                .total,
            2
        );
    }

    #[test]
    fn resync_repairs_missing_options() {
        let fx = service();
        let list = new_list(&fx, &[]);
        fx.create_option_list_entry(
            &admin(),
            CreateOptionListEntry {
                list_id: list.id.clone(),
                label: "West".into(),
                value: None,
            },
        )
        .unwrap();

        // simulate a lost second step by wiping the list's options
        let mut wiped = fx.get_option_list(&list.id).unwrap();
        wiped.options.clear();
        fx.store
            .update_record(table::OPTION_LISTS, &list.id, &wiped, &[])
            .unwrap();

        let repaired = fx.resync_option_list(&admin(), &list.id).unwrap();
        assert_eq!(repaired.options.len(), 1);
        assert_eq!(repaired.options[0].value, "West");
    }

    #[test]
    fn entry_for_missing_list_is_not_found() {
        let fx = service();
        assert!(matches!(
            fx.create_option_list_entry(
                &admin(),
                CreateOptionListEntry {
                    list_id: "nope".into(),
                    label: "A".into(),
                    value: None,
                },
            ),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn dangling_list_is_configuration_error_at_render() {
        let fx = service();
        let svc = new_service(&fx);
        let list = new_list(&fx, &[("A", "a")]);
        let mut radio = field(&svc, "Pick", "RADIO");
        radio.option_list_id = Some(list.id.clone());
        fx.create_form_field(&admin(), radio).unwrap();
        assert!(fx.form_schema(&svc).is_ok());

        let mut wiped = fx.get_option_list(&list.id).unwrap();
        wiped.options.clear();
        fx.store
            .update_record(table::OPTION_LISTS, &list.id, &wiped, &[])
            .unwrap();
        assert!(matches!(fx.form_schema(&svc), Err(ServiceError::Configuration(_))));
    }
}
