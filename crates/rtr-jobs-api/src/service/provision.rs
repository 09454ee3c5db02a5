//! Workflow provisioning for non-draft jobs.
//!
//! Every job gets one action workflow per schedule (`"<name> RunNow"` and
//! `"<name> Schedule"`) built from the template of its action, plus one
//! notifier workflow that fires on completion of any of them.

use rtr_jobs_clients::{ProvisionRequest, WorkflowProvisioner};
use rtr_jobs_config::WorkflowsConfig;
use rtr_jobs_core::job::{Action, QUERY_REGISTRY_KEY, TargetHost, WorkflowsInfo};
use rtr_jobs_core::{Job, Schedule};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::ApiError;

const TRIGGER_NODE: &str = "trigger";
const TRIGGER_FIELD: &str = "timer_event_definition";

const HOST_FIELD: &str = "device_query_78798221.Device.query.devices.#";
const GROUP_FIELD: &str = "get_device_details_d2e382bd.Device.GetDetails.Groups";
const UNDEFINED: &str = "undefined";

const NOTIFIER_CONDITION_NODE: &str = "definitionID_is_equal_to_parameterized_79b66807";
const NOTIFIER_CONDITION_FIELD: &str = "Trigger.Category.WorkflowExecution.DefinitionID";
const EMAIL_NODE: &str = "send_email_1fddc95a";

const FILE_QUERY_NODE: &str = "check_file_or_registry_exist_abb289a5";
const REGISTRY_QUERY_NODE: &str = "check_registry_exist_3e0e47d3";
const INSTALL_NODE: &str = "put_and_run_install_software";
const REMOVE_NODE: &str = "remove_file_from_host";

const OP_IN: &str = "IN";
const OP_NOT_IN: &str = "NOT_IN";

/// Template name and activity configuration for an action.
fn action_activity(action: &Action, cfg: &WorkflowsConfig) -> (String, Value) {
    match action {
        Action::BuildQuery {
            query_type,
            registry_keys,
            ..
        } if query_type == QUERY_REGISTRY_KEY => {
            let keys: Vec<&str> = registry_keys.iter().map(|r| r.key.as_str()).collect();
            let values: Vec<&str> = registry_keys.iter().map(|r| r.value.as_str()).collect();
            (
                cfg.registry_query_template.clone(),
                json!({
                    "node_id": REGISTRY_QUERY_NODE,
                    "properties": { "keys": keys, "values": values },
                }),
            )
        }
        Action::BuildQuery {
            query_file_paths, ..
        } => (
            cfg.file_query_template.clone(),
            json!({
                "node_id": FILE_QUERY_NODE,
                "properties": { "keys": query_file_paths },
            }),
        ),
        Action::InstallSoftware {
            install_file_path,
            command_switch,
            file_name,
        } => (
            cfg.install_template.clone(),
            json!({
                "node_id": INSTALL_NODE,
                "properties": {
                    "file_name": file_name,
                    "file_path": install_file_path,
                    "command_switch": command_switch,
                },
            }),
        ),
        Action::RemoveFile {
            remove_file_name,
            remove_file_path,
        } => (
            cfg.remove_template.clone(),
            json!({
                "node_id": REMOVE_NODE,
                "properties": {
                    "file_name": remove_file_name,
                    "file_path": remove_file_path,
                },
            }),
        ),
    }
}

/// Scope the workflow to explicit hosts, or to host groups when no hosts
/// are named.
fn target_condition(target: &TargetHost, cfg: &WorkflowsConfig) -> Value {
    let undefined = vec![UNDEFINED.to_string()];
    let (host_op, hosts, group_op, groups) = if target.hosts.is_empty() {
        (OP_NOT_IN, &undefined, OP_IN, &target.host_groups)
    } else {
        (OP_IN, &target.hosts, OP_NOT_IN, &undefined)
    };
    json!({
        "node_id": cfg.condition_node_id,
        "fields": [
            { "name": GROUP_FIELD, "operator": group_op, "value": groups },
            { "name": HOST_FIELD, "operator": host_op, "value": hosts },
        ],
    })
}

fn trigger(schedule: &Schedule) -> Value {
    let mut properties = json!({
        "time_cycle": schedule.time_cycle,
        "tz": schedule.timezone,
        "skip_concurrent": false,
    });
    if !schedule.start.is_empty() {
        properties["start_date"] = json!(schedule.start);
    }
    if !schedule.end.is_empty() {
        properties["end_date"] = json!(schedule.end);
    }
    let mut fields = Map::new();
    fields.insert(TRIGGER_FIELD.to_string(), json!({ "properties": properties }));
    json!({ "node_id": TRIGGER_NODE, "fields": fields })
}

/// Action workflow requests for a decorated job, run-now first.
pub fn action_requests(
    job: &Job,
    cfg: &WorkflowsConfig,
) -> Result<Vec<ProvisionRequest>, ApiError> {
    let action = job
        .action
        .as_ref()
        .ok_or_else(|| ApiError::Internal(format!("job {} has no action to provision", job.name)))?;
    let (template_name, activity) = action_activity(action, cfg);
    let condition = target_condition(&job.target.clone().unwrap_or_default(), cfg);

    let schedules = [
        (job.run_now_schedule.as_ref(), "RunNow"),
        (job.wschedule.as_ref(), "Schedule"),
    ];
    Ok(schedules
        .into_iter()
        .filter_map(|(schedule, suffix)| schedule.map(|s| (s, suffix)))
        .map(|(schedule, suffix)| ProvisionRequest {
            name: format!("{} {}", job.name, suffix),
            template_name: template_name.clone(),
            parameters: json!({
                "trigger": trigger(schedule),
                "conditions": [condition.clone()],
                "activities": { "configuration": [activity.clone()] },
            }),
        })
        .collect())
}

/// Notifier workflow request: e-mails the job's recipients when any of
/// `workflow_ids` finishes.
pub fn notifier_request(job: &Job, workflow_ids: &[String], cfg: &WorkflowsConfig) -> ProvisionRequest {
    ProvisionRequest {
        name: job.name.clone(),
        template_name: cfg.notifier_template.clone(),
        parameters: json!({
            "conditions": [{
                "node_id": NOTIFIER_CONDITION_NODE,
                "fields": [{
                    "name": NOTIFIER_CONDITION_FIELD,
                    "operator": OP_IN,
                    "value": workflow_ids,
                }],
            }],
            "activities": { "configuration": [{
                "node_id": EMAIL_NODE,
                "properties": { "to": job.notifications },
            }]},
        }),
    }
}

async fn provision_one(
    provisioner: &dyn WorkflowProvisioner,
    request: &ProvisionRequest,
) -> Result<String, ApiError> {
    let ids = provisioner
        .provision(request)
        .await
        .map_err(|e| ApiError::internal(&format!("failed to provision workflow {}", request.name), e))?;
    ids.into_iter().next().ok_or_else(|| {
        ApiError::Internal(format!("resources from workflow {} is 0", request.name))
    })
}

/// Provision all workflows of a job and return their ids.
pub async fn provision_job(
    provisioner: &dyn WorkflowProvisioner,
    job: &Job,
    cfg: &WorkflowsConfig,
) -> Result<WorkflowsInfo, ApiError> {
    let mut schedule_workflows = Vec::new();
    for request in action_requests(job, cfg)? {
        schedule_workflows.push(provision_one(provisioner, &request).await?);
    }
    let notifier_workflow =
        provision_one(provisioner, &notifier_request(job, &schedule_workflows, cfg)).await?;

    info!(
        job = %job.name,
        workflows = schedule_workflows.len(),
        notifier = %notifier_workflow,
        "provisioned job workflows"
    );
    Ok(WorkflowsInfo {
        notifier_workflow,
        schedule_workflows,
    })
}
