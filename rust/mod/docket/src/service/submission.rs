use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use docket_blob::BlobError;
use docket_core::{new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use docket_sql::Value;

use crate::engine::{plan, transition_columns, Decision, PaymentSource, Transition};
use crate::model::{
    Actor, Availability, FormData, PaymentStatus, Role, Submission, SubmissionStatus,
};
use crate::service::DocketService;
use crate::store::table;
use crate::template::{Certificate, TemplateRenderer};

/// Body of a status update. Either `action` (`accept`/`reject`) or
/// `newStatus` names the change; `userId`/`userRole`, when sent, must
/// match the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPayment {
    pub status: PaymentStatus,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A submission with its service's display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// A file part of a multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

fn blob_err(e: BlobError) -> ServiceError {
    match e {
        BlobError::Rejected(m) | BlobError::InvalidKey(m) => ServiceError::Validation(m),
        BlobError::Io(m) => ServiceError::Storage(m),
    }
}

impl DocketService {
    /// Create a submission: the service must be enabled and the data must
    /// satisfy its form. Starts at stage 1 with payment pending.
    pub fn submit(
        &self,
        actor: &Actor,
        service_id: &str,
        form_data: FormData,
    ) -> Result<Submission, ServiceError> {
        if self.availability(service_id)? != Availability::Enabled {
            return Err(ServiceError::Validation(format!(
                "service '{service_id}' is not accepting submissions"
            )));
        }
        let schema = self.form_schema(service_id)?;
        let form_data = schema.validate(form_data)?;
        for (field, key) in schema.upload_keys(&form_data) {
            if !self.blobs.exists(key).map_err(blob_err)? {
                return Err(ServiceError::Validation(format!(
                    "{field}: no uploaded file named {key}"
                )));
            }
        }

        let now = now_rfc3339();
        let sub = Submission {
            id: new_id(),
            service_id: service_id.to_string(),
            form_data,
            status: SubmissionStatus::Stage1Pending,
            payment_status: PaymentStatus::Pending,
            submitted_by: actor.id.clone(),
            submitted_at: now.clone(),
            processed_by: Vec::new(),
            payment_details: None,
            version: 0,
            updated_at: now,
        };

        let mut cols = transition_columns(&sub);
        cols.push(("service_id", sub.service_id.clone().into()));
        cols.push(("submitted_by", sub.submitted_by.clone().into()));
        cols.push(("created_at", sub.submitted_at.clone().into()));
        self.store
            .insert_record(table::SUBMISSIONS, &sub.id, &sub, &cols, "submission")?;

        tracing::info!(submission = %sub.id, service = %service_id, by = %actor.id, "submission received");
        Ok(sub)
    }

    /// Store uploaded files, put their URLs into the form data under the
    /// file's field name, then [`submit`](Self::submit). Files are removed
    /// again if the submission is refused.
    pub fn submit_with_files(
        &self,
        actor: &Actor,
        service_id: &str,
        mut form_data: FormData,
        files: Vec<UploadedFile>,
    ) -> Result<Submission, ServiceError> {
        // refuse early so nothing is written for a disabled service
        if self.availability(service_id)? != Availability::Enabled {
            return Err(ServiceError::Validation(format!(
                "service '{service_id}' is not accepting submissions"
            )));
        }

        let schema = self.form_schema(service_id)?;
        let upload_fields = schema.upload_fields();
        if let Some(stray) = files.iter().find(|f| !upload_fields.contains(&f.field.as_str())) {
            return Err(ServiceError::Validation(format!(
                "{} is not a file upload field",
                stray.field
            )));
        }

        let mut stored = Vec::with_capacity(files.len());
        let result = (|| {
            for file in &files {
                let key = self
                    .config
                    .upload_policy
                    .key_for(&file.field, &file.filename)
                    .map_err(blob_err)?;
                self.blobs.put(&key, &file.bytes).map_err(blob_err)?;
                stored.push(key.clone());
                let url = format!("{}/{}", self.config.public_upload_base.trim_end_matches('/'), key);
                form_data.insert(file.field.clone(), serde_json::Value::String(url));
            }
            self.submit(actor, service_id, form_data)
        })();

        if result.is_err() {
            for key in &stored {
                if let Err(e) = self.blobs.delete(key) {
                    tracing::warn!(key = %key, error = %e, "failed to remove orphaned upload");
                }
            }
        }
        result
    }

    /// Load a submission the caller may see. Citizens see only their own.
    pub fn get_submission(&self, actor: &Actor, id: &str) -> Result<Submission, ServiceError> {
        let sub = self.engine.load(id)?;
        if actor.role == Role::Citizen && sub.submitted_by != actor.id {
            return Err(ServiceError::PermissionDenied(format!(
                "submission {id} belongs to another user"
            )));
        }
        Ok(sub)
    }

    pub fn list_submissions(
        &self,
        actor: &Actor,
        query: &SubmissionQuery,
        params: &ListParams,
    ) -> Result<ListResult<SubmissionView>, ServiceError> {
        let mut filters: Vec<(&str, Value)> = Vec::new();
        if let Some(service_id) = query.service_id.as_deref() {
            filters.push(("service_id", service_id.into()));
        }
        if let Some(status) = query.status.as_deref() {
            let status = SubmissionStatus::from_str(status)
                .ok_or_else(|| ServiceError::Validation(format!("unknown status {status:?}")))?;
            filters.push(("status", status.as_str().into()));
        }
        if actor.role == Role::Citizen {
            filters.push(("submitted_by", actor.id.as_str().into()));
        }

        let (subs, total): (Vec<Submission>, usize) =
            self.store
                .list_records(table::SUBMISSIONS, &filters, params.limit, params.offset)?;

        let mut names: HashMap<String, Option<String>> = HashMap::new();
        let mut items = Vec::with_capacity(subs.len());
        for submission in subs {
            let name = match names.get(&submission.service_id) {
                Some(n) => n.clone(),
                None => {
                    let n = match self.get_service(&submission.service_id) {
                        Ok(s) => Some(s.name),
                        Err(ServiceError::NotFound(_)) => None,
                        Err(e) => return Err(e),
                    };
                    names.insert(submission.service_id.clone(), n.clone());
                    n
                }
            };
            items.push(SubmissionView {
                submission,
                service_name: name,
            });
        }
        Ok(ListResult { items, total })
    }

    /// Apply a reviewer's status update.
    ///
    /// `rejected` (or `action: reject`) rejects. Any other target status is
    /// accepted when it is where an ACCEPT would lead; an admin asking for a
    /// different later status gets an audited override instead.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Submission, ServiceError> {
        if let Some(user_id) = update.user_id.as_deref() {
            if user_id != actor.id {
                return Err(ServiceError::PermissionDenied(
                    "userId does not match the authenticated user".into(),
                ));
            }
        }
        if let Some(role) = update.user_role.as_deref() {
            if role != actor.role.as_str() {
                return Err(ServiceError::PermissionDenied(
                    "userRole does not match the authenticated user".into(),
                ));
            }
        }

        let remark = update.remark.clone();
        let transition = if let Some(action) = update.action.as_deref() {
            let decision = match action.trim().to_ascii_lowercase().as_str() {
                "accept" | "approve" => Decision::Accept,
                "reject" => Decision::Reject,
                other => {
                    return Err(ServiceError::Validation(format!("unknown action {other:?}")));
                }
            };
            Transition::Review { decision, remark }
        } else {
            let raw = update
                .new_status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ServiceError::Validation("newStatus or action is required".into()))?;
            let target = SubmissionStatus::from_str(raw)
                .ok_or_else(|| ServiceError::Validation(format!("unknown status {raw:?}")))?;
            let transition = self.transition_towards(actor, id, target, remark)?;
            return self.engine.apply_towards(id, actor, transition, target);
        };

        self.engine.apply(id, actor, transition)
    }

    fn transition_towards(
        &self,
        actor: &Actor,
        id: &str,
        target: SubmissionStatus,
        remark: Option<String>,
    ) -> Result<Transition, ServiceError> {
        if target == SubmissionStatus::Rejected {
            return Ok(Transition::Review {
                decision: Decision::Reject,
                remark,
            });
        }

        let sub = self.engine.load(id)?;
        let policy = self.engine.policy_for(&sub.service_id)?;
        let accept = Transition::Review {
            decision: Decision::Accept,
            remark: remark.clone(),
        };
        match plan(&sub, actor, &accept, &policy, &now_rfc3339()) {
            Ok(out) if out.status == target => Ok(accept),
            _ if actor.is_admin() => Ok(Transition::Override {
                status: target,
                remark,
            }),
            Ok(out) => Err(ServiceError::Validation(format!(
                "cannot move submission to {target}; accepting leads to {}",
                out.status
            ))),
            Err(e) => Err(e),
        }
    }

    /// Staff correction of the payment status.
    pub fn set_payment_status(
        &self,
        actor: &Actor,
        id: &str,
        input: ManualPayment,
    ) -> Result<Submission, ServiceError> {
        self.engine.apply(
            id,
            actor,
            Transition::PaymentSettled {
                status: input.status,
                source: PaymentSource::Manual,
                details: None,
                remark: input.remark,
            },
        )
    }

    /// Render the certificate of a completed submission.
    pub fn certificate(&self, actor: &Actor, id: &str) -> Result<Certificate, ServiceError> {
        let sub = self.get_submission(actor, id)?;
        if sub.status != SubmissionStatus::Completed {
            return Err(ServiceError::Validation(format!(
                "submission {id} is {}; certificates are issued once completed",
                sub.status
            )));
        }
        let template = self.certificate_template(&sub.service_id)?;

        let schema = self.form_schema(&sub.service_id)?;
        let renderer = TemplateRenderer::default().with_date_fields(schema.date_fields());

        let mut data = sub.form_data.clone();
        data.entry("submittedAt".to_string())
            .or_insert_with(|| serde_json::Value::String(sub.submitted_at.clone()));

        Ok(renderer.issue(&sub.id, &sub.service_id, &template, &data, chrono::Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CreateAuthorizationStep, CreateFormField, CreateService, CreateServiceConfig,
        SetAvailability,
    };
    use crate::service::testing::*;
    use serde_json::json;

    /// An enabled service with a required `Name` and a `Date of Birth` field.
    fn ready_service(fx: &Fixture, paid: bool) -> String {
        let id = fx
            .create_service(
                &admin(),
                CreateService {
                    name: format!("svc-{}", new_id()),
                    table_name: None,
                    time_limit: None,
                },
            )
            .unwrap()
            .id;
        let mut name = CreateFormField {
            service_id: id.clone(),
            field_name: None,
            field_type: "INPUT-TEXT".into(),
            label: "Name".into(),
            required: true,
            min: None,
            max: None,
            option_list_id: None,
            help_text: None,
            notes: None,
            position: None,
        };
        fx.create_form_field(&admin(), name.clone()).unwrap();
        name.label = "Date of Birth".into();
        name.field_type = "DATE".into();
        name.required = false;
        fx.create_form_field(&admin(), name.clone()).unwrap();
        name.label = "Proof".into();
        name.field_type = "UPLOAD".into();
        fx.create_form_field(&admin(), name).unwrap();

        fx.create_service_config(
            &admin(),
            CreateServiceConfig {
                service_id: id.clone(),
                is_paid_service: paid,
                rate_of_service: if paid { 500.0 } else { 0.0 },
                custom_rate: None,
                certificate_data: "This certifies {{Name}}, born {{Date of Birth}}, applied {{submittedAt}}. {{Father}}".into(),
            },
        )
        .unwrap();
        fx.set_availability(
            &admin(),
            SetAvailability {
                service_id: id.clone(),
                status: Availability::Enabled,
            },
        )
        .unwrap();
        id
    }

    fn form(v: serde_json::Value) -> FormData {
        serde_json::from_value(v).unwrap()
    }

    fn to(status: &str) -> StatusUpdate {
        StatusUpdate {
            new_status: Some(status.into()),
            ..Default::default()
        }
    }

    #[test]
    fn submit_starts_at_stage_one_pending_payment() {
        let fx = service();
        let svc = ready_service(&fx, true);
        let sub = fx
            .submit(&citizen("c1"), &svc, form(json!({"Name": "A", "junk": 1})))
            .unwrap();
        assert_eq!(sub.status, SubmissionStatus::Stage1Pending);
        assert_eq!(sub.payment_status, PaymentStatus::Pending);
        assert!(sub.processed_by.is_empty());
        assert_eq!(sub.form_data.len(), 1);
        assert_eq!(sub.version, 0);
    }

    #[test]
    fn submit_rejects_invalid_or_disabled() {
        let fx = service();
        let svc = ready_service(&fx, false);
        assert!(matches!(
            fx.submit(&citizen("c1"), &svc, form(json!({"Date of Birth": "1990-01-01"}))),
            Err(ServiceError::Validation(_))
        ));

        fx.set_availability(
            &admin(),
            SetAvailability {
                service_id: svc.clone(),
                status: Availability::Disabled,
            },
        )
        .unwrap();
        let err = fx
            .submit(&citizen("c1"), &svc, form(json!({"Name": "A"})))
            .unwrap_err();
        assert!(err.to_string().contains("not accepting"));
    }

    #[test]
    fn uploads_become_urls_and_are_cleaned_up_on_failure() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let file = |name: &str| UploadedFile {
            field: "Proof".into(),
            filename: name.into(),
            bytes: b"%PDF-1.4".to_vec(),
        };

        let sub = fx
            .submit_with_files(&citizen("c1"), &svc, form(json!({"Name": "A"})), vec![file("id.pdf")])
            .unwrap();
        let url = sub.form_data["Proof"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/Proof-"), "{url}");
        let key = url.trim_start_matches("/uploads/");
        assert!(fx.blobs.exists(key).unwrap());

        // wrong type
        assert!(matches!(
            fx.submit_with_files(&citizen("c1"), &svc, form(json!({"Name": "A"})), vec![file("x.exe")]),
            Err(ServiceError::Validation(_))
        ));

        // stored, then the form fails validation: nothing left behind
        let before = std::fs::read_dir(fx.dir().join("uploads")).unwrap().count();
        assert!(fx
            .submit_with_files(&citizen("c1"), &svc, FormData::new(), vec![file("y.png")])
            .is_err());
        let after = std::fs::read_dir(fx.dir().join("uploads")).unwrap().count();
        assert_eq!(before, after);
    }

    #[test]
    fn json_submit_only_references_stored_uploads() {
        let fx = service();
        let svc = ready_service(&fx, false);

        let foreign = fx.submit(
            &citizen("c1"),
            &svc,
            form(json!({"Name": "A", "Proof": "https://evil.example/payload.exe"})),
        );
        assert!(matches!(foreign, Err(ServiceError::Validation(_))));

        // right shape, but nothing was ever stored under that name
        let forged = fx.submit(
            &citizen("c1"),
            &svc,
            form(json!({"Name": "A", "Proof": "/uploads/Proof-1718000000000-123456789.pdf"})),
        );
        assert!(matches!(forged, Err(ServiceError::Validation(_))));

        let first = fx
            .submit_with_files(
                &citizen("c1"),
                &svc,
                form(json!({"Name": "A"})),
                vec![UploadedFile {
                    field: "Proof".into(),
                    filename: "id.pdf".into(),
                    bytes: b"%PDF-1.4".to_vec(),
                }],
            )
            .unwrap();
        let url = first.form_data["Proof"].clone();
        let again = fx
            .submit(&citizen("c1"), &svc, form(json!({"Name": "B", "Proof": url.clone()})))
            .unwrap();
        assert_eq!(again.form_data["Proof"], url);
    }

    #[test]
    fn citizens_only_see_their_own() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let mine = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();
        fx.submit(&citizen("c2"), &svc, form(json!({"Name": "B"}))).unwrap();

        let page = fx
            .list_submissions(&citizen("c1"), &SubmissionQuery::default(), &ListParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items[0].service_name.is_some());

        let all = fx
            .list_submissions(&auth1(), &SubmissionQuery::default(), &ListParams::default())
            .unwrap();
        assert_eq!(all.total, 2);

        assert!(matches!(
            fx.get_submission(&citizen("c2"), &mine.id),
            Err(ServiceError::PermissionDenied(_))
        ));
        assert!(fx.get_submission(&auth2(), &mine.id).is_ok());

        let q = SubmissionQuery {
            service_id: None,
            status: Some("auth_1".into()),
        };
        assert_eq!(fx.list_submissions(&admin(), &q, &ListParams::default()).unwrap().total, 2);
    }

    #[test]
    fn listing_tolerates_deleted_services_but_not_storage_errors() {
        use docket_sql::SQLStore;

        let fx = service();
        let svc = ready_service(&fx, false);
        fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        fx.sql.exec("DELETE FROM services", &[]).unwrap();
        let page = fx
            .list_submissions(&admin(), &SubmissionQuery::default(), &ListParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].service_name, None);

        fx.sql.exec_batch("DROP TABLE services").unwrap();
        assert!(matches!(
            fx.list_submissions(&admin(), &SubmissionQuery::default(), &ListParams::default()),
            Err(ServiceError::Storage(_))
        ));
    }

    #[test]
    fn free_service_walks_both_stages() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        let s1 = fx.update_status(&auth1(), &sub.id, to("stage_2_pending")).unwrap();
        assert_eq!(s1.status, SubmissionStatus::Stage2Pending);
        let s2 = fx
            .update_status(
                &auth2(),
                &sub.id,
                StatusUpdate {
                    action: Some("accept".into()),
                    remark: Some("verified".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(s2.status, SubmissionStatus::Completed);
        assert_eq!(s2.processed_by.len(), 2);
        assert_eq!(s2.processed_by[1].remark, "verified");
    }

    #[test]
    fn paid_service_is_gated_until_payment() {
        let fx = service();
        let svc = ready_service(&fx, true);
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        assert!(matches!(
            fx.update_status(&auth1(), &sub.id, to("stage_2_pending")),
            Err(ServiceError::Validation(_))
        ));

        let paid = fx
            .set_payment_status(
                &auth1(),
                &sub.id,
                ManualPayment {
                    status: PaymentStatus::Success,
                    remark: Some("cash".into()),
                },
            )
            .unwrap();
        assert_eq!(paid.status, SubmissionStatus::Stage1Pending);
        assert_eq!(paid.processed_by[0].action, "Payment status updated to success");

        let next = fx.update_status(&auth1(), &sub.id, to("auth_2")).unwrap();
        assert_eq!(next.status, SubmissionStatus::Stage2Pending);
    }

    #[test]
    fn mismatched_target_and_identity() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        // auth_1 accepting leads to stage 2, not completed
        assert!(matches!(
            fx.update_status(&auth1(), &sub.id, to("completed")),
            Err(ServiceError::Validation(_))
        ));
        let spoofed = StatusUpdate {
            user_id: Some("someone-else".into()),
            ..to("stage_2_pending")
        };
        assert!(matches!(
            fx.update_status(&auth1(), &sub.id, spoofed),
            Err(ServiceError::PermissionDenied(_))
        ));
        assert!(matches!(
            fx.update_status(&auth1(), &sub.id, StatusUpdate::default()),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            fx.update_status(&auth1(), "bad id", to("rejected")),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn admin_override_bypasses_payment_gate() {
        let fx = service();
        let svc = ready_service(&fx, true);
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();
        let done = fx.update_status(&admin(), &sub.id, to("completed")).unwrap();
        assert_eq!(done.status, SubmissionStatus::Completed);
        assert_eq!(done.payment_status, PaymentStatus::Pending);
        assert_eq!(done.processed_by[0].action, "Status overridden to completed");
    }

    #[test]
    fn reject_is_terminal() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();
        let rejected = fx
            .update_status(
                &auth1(),
                &sub.id,
                StatusUpdate {
                    remark: Some("incomplete docs".into()),
                    ..to("rejected")
                },
            )
            .unwrap();
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(rejected.processed_by.len(), 1);
        assert_eq!(rejected.processed_by[0].remark, "incomplete docs");

        assert!(matches!(
            fx.update_status(&admin(), &sub.id, to("completed")),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn configured_steps_drive_review() {
        let fx = service();
        let svc = ready_service(&fx, false);
        fx.create_authorization_step(
            &admin(),
            CreateAuthorizationStep {
                service_id: svc.clone(),
                actor: "auth_2".into(),
                stage: 1,
                subzones: vec![],
                supervisor_of: None,
                can_take_payment: false,
                can_reject: true,
            },
        )
        .unwrap();
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        assert!(matches!(
            fx.update_status(&auth1(), &sub.id, to("stage_2_pending")),
            Err(ServiceError::PermissionDenied(_))
        ));
        let done = fx.update_status(&auth2(), &sub.id, to("completed")).unwrap();
        assert_eq!(done.status, SubmissionStatus::Completed);
    }

    #[test]
    fn stale_status_request_conflicts() {
        let fx = service();
        let svc = ready_service(&fx, false);
        for stage in [1, 2] {
            fx.create_authorization_step(
                &admin(),
                CreateAuthorizationStep {
                    service_id: svc.clone(),
                    actor: "auth_2".into(),
                    stage,
                    subzones: vec![],
                    supervisor_of: None,
                    can_take_payment: false,
                    can_reject: true,
                },
            )
            .unwrap();
        }
        let sub = fx.submit(&citizen("c1"), &svc, form(json!({"Name": "A"}))).unwrap();

        // first reviewer resolves the request, then a second one moves the
        // submission before the first write lands
        let planned = fx
            .transition_towards(&auth2(), &sub.id, SubmissionStatus::Stage2Pending, None)
            .unwrap();
        let other = Actor::new("officer-3", Role::Auth2);
        let moved = fx.update_status(&other, &sub.id, to("stage_2_pending")).unwrap();
        assert_eq!(moved.status, SubmissionStatus::Stage2Pending);

        let err = fx
            .engine
            .apply_towards(&sub.id, &auth2(), planned, SubmissionStatus::Stage2Pending)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)), "{err}");

        let stored = fx.get_submission(&admin(), &sub.id).unwrap();
        assert_eq!(stored.status, SubmissionStatus::Stage2Pending);
        assert_eq!(stored.processed_by.len(), 1);
    }

    #[test]
    fn certificate_for_completed_only() {
        let fx = service();
        let svc = ready_service(&fx, false);
        let sub = fx
            .submit(
                &citizen("c1"),
                &svc,
                form(json!({"Name": "Asha", "Date of Birth": "1990-02-28"})),
            )
            .unwrap();
        assert!(matches!(
            fx.certificate(&citizen("c1"), &sub.id),
            Err(ServiceError::Validation(_))
        ));

        fx.update_status(&auth2(), &sub.id, to("completed")).unwrap();
        let cert = fx.certificate(&citizen("c1"), &sub.id).unwrap();
        assert!(cert.body.starts_with("This certifies Asha, born February 28, 1990, applied "));
        assert!(cert.body.ends_with(". N/A"));
        assert!(!cert.body.contains("{{"));
        assert_eq!(cert.payload.id, sub.id);
        assert_eq!(cert.payload.name, "Asha");
        assert_eq!(cert.payload.service_id, svc);

        assert!(fx.certificate(&citizen("c2"), &sub.id).is_err());
    }
}
