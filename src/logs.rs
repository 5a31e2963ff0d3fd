//! Instance-assignment lookup for the `logs` command: the provider logs
//! which VM backs each workstation; we query the last 24 hours of those
//! entries and build a cloud console URL for the assigned instance.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::warn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceAssignment {
    pub instance_name: String,
    pub instance_id: String,
    pub logs_url: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    resource: RawResource,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResource {
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

pub fn console_logs_url(project: &str, instance_id: &str) -> String {
    format!(
        "https://console.cloud.google.com/logs/query;\
         query=resource.type%3D%22gce_instance%22%0A\
         resource.labels.instance_id%3D%22{instance_id}%22?project={project}"
    )
}

fn assignment_filter(project: &str, since: &str) -> String {
    format!(
        "logName=\"projects/{project}/logs/workstations.googleapis.com%2Fvm_assignments\" \
         AND timestamp >= \"{since}\""
    )
}

/// Map of workstation id to its most recent VM assignment over the last
/// 24 hours, read via `gcloud logging read`.
pub fn instance_assignments(project: &str) -> Result<BTreeMap<String, InstanceAssignment>> {
    let since = (Utc::now() - Duration::days(1)).to_rfc3339();
    let filter = assignment_filter(project, &since);

    let output = Command::new("gcloud")
        .args([
            "logging",
            "read",
            &filter,
            &format!("--project={project}"),
            "--format=json",
        ])
        .output()
        .context("failed to run gcloud (is the gcloud CLI on PATH?)")?;

    if !output.status.success() {
        anyhow::bail!(
            "gcloud logging read failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let raw: Vec<RawEntry> = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
        .context("invalid JSON from gcloud logging read")?;

    Ok(collect_assignments(raw, project))
}

fn collect_assignments(
    entries: Vec<RawEntry>,
    project: &str,
) -> BTreeMap<String, InstanceAssignment> {
    let mut assignments = BTreeMap::new();

    for entry in entries {
        let Some(workstation_id) = entry.resource.labels.get("workstation_id") else {
            warn!("assignment entry without workstation_id label, skipping");
            continue;
        };
        let instance_name = entry.labels.get("instance_name").cloned().unwrap_or_default();
        let instance_id = entry.labels.get("instance_id").cloned().unwrap_or_default();

        assignments.insert(
            workstation_id.clone(),
            InstanceAssignment {
                logs_url: console_logs_url(project, &instance_id),
                instance_name,
                instance_id,
            },
        );
    }

    assignments
}
