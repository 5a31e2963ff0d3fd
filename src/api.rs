use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use thiserror::Error;

use crate::config::WorkstationDescriptor;
use crate::machines;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("workstation `{name}` already exists")]
    AlreadyExists { name: String },

    #[error(
        "reauthentication is needed, please run `gcloud auth login && gcloud auth application-default login`"
    )]
    Auth,

    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub subnetwork: String,
}

/// Usable workstation config, annotated with specs from the local machine
/// catalog.
#[derive(Debug, Clone)]
pub struct ConfigSummary {
    pub name: String,
    pub image: String,
    pub machine_type: String,
    pub machine_specs: String,
    pub idle_timeout_secs: f64,
    pub max_runtime_secs: f64,
}

#[derive(Debug, Clone)]
pub struct WorkstationInfo {
    pub name: String,
    /// Wire state string, e.g. `STATE_RUNNING`.
    pub state: String,
    pub env: BTreeMap<String, String>,
    pub config: ConfigSummary,
}

pub struct CreateRequest {
    pub descriptor: WorkstationDescriptor,
    pub env: BTreeMap<String, String>,
}

pub struct StartedWorkstation {
    pub host: String,
}

pub struct StoppedWorkstation {
    pub name: String,
    pub state: String,
}

/// Control-plane operations against the provider. Long-running operations
/// (create/start/stop/delete) are awaited to completion before returning;
/// listings are consumed eagerly.
pub trait WorkstationsApi {
    fn list_clusters(&self, project: &str, location: &str) -> Result<Vec<Cluster>>;
    fn list_configs(
        &self,
        project: &str,
        location: &str,
        cluster: &str,
    ) -> Result<Vec<ConfigSummary>>;
    fn list_workstations(
        &self,
        project: &str,
        location: &str,
        cluster: &str,
    ) -> Result<Vec<WorkstationInfo>>;
    fn create_workstation(&self, request: &CreateRequest) -> Result<()>;
    fn start_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<StartedWorkstation>;
    fn stop_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<StoppedWorkstation>;
    fn delete_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<()>;
}

/// Implementation backed by the `gcloud workstations` CLI with
/// `--format=json`. The CLI blocks until each long-running operation
/// completes, which gives the synchronous await semantics for free.
pub struct GcloudApi;

// Raw gcloud JSON shapes. Nested fields default so partially populated
// resources deserialize cleanly.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    name: String,
    #[serde(default)]
    container: RawContainer,
    #[serde(default)]
    host: RawHost,
    #[serde(default)]
    idle_timeout: String,
    #[serde(default)]
    running_timeout: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawContainer {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHost {
    #[serde(default)]
    gce_instance: RawGceInstance,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGceInstance {
    #[serde(default)]
    machine_type: String,
}

#[derive(Debug, Deserialize)]
struct RawWorkstation {
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawStarted {
    #[serde(default)]
    host: String,
}

#[derive(Debug, Deserialize)]
struct RawStopped {
    name: String,
    #[serde(default)]
    state: String,
}

/// gcloud renders durations as e.g. `"1200s"`.
fn duration_secs(raw: &str) -> f64 {
    raw.trim_end_matches('s').parse().unwrap_or_default()
}

/// Resource names come back as full paths
/// (`projects/p/locations/l/.../workstationConfigs/cfg`); the CLI flags
/// want the final segment.
pub fn short_name(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

impl GcloudApi {
    fn run(&self, args: &[String]) -> Result<String> {
        let rendered = format!("gcloud {}", args.join(" "));
        debug!("running {rendered}");

        let output = Command::new("gcloud")
            .args(args)
            .output()
            .context("failed to run gcloud (is the gcloud CLI on PATH?)")?;

        if !output.status.success() {
            return Err(ApiError::CommandFailed {
                command: rendered,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn scope_args(descriptor: &WorkstationDescriptor) -> Vec<String> {
        vec![
            format!("--project={}", descriptor.project),
            format!("--region={}", descriptor.location),
            format!("--cluster={}", descriptor.cluster),
            format!("--config={}", descriptor.config),
        ]
    }
}

impl WorkstationsApi for GcloudApi {
    fn list_clusters(&self, project: &str, location: &str) -> Result<Vec<Cluster>> {
        let stdout = self.run(&[
            "workstations".to_string(),
            "clusters".to_string(),
            "list".to_string(),
            format!("--project={project}"),
            format!("--region={location}"),
            "--format=json".to_string(),
        ])?;

        serde_json::from_str(&stdout).context("invalid JSON from gcloud clusters list")
    }

    fn list_configs(
        &self,
        project: &str,
        location: &str,
        cluster: &str,
    ) -> Result<Vec<ConfigSummary>> {
        let stdout = self.run(&[
            "workstations".to_string(),
            "configs".to_string(),
            "list".to_string(),
            format!("--project={project}"),
            format!("--region={location}"),
            format!("--cluster={cluster}"),
            "--format=json".to_string(),
        ])?;

        let raw: Vec<RawConfig> =
            serde_json::from_str(&stdout).context("invalid JSON from gcloud configs list")?;

        Ok(summarize_configs(raw))
    }

    fn list_workstations(
        &self,
        project: &str,
        location: &str,
        cluster: &str,
    ) -> Result<Vec<WorkstationInfo>> {
        let configs = self.list_configs(project, location, cluster)?;

        let mut workstations = Vec::new();
        for config in configs {
            let stdout = self.run(&[
                "workstations".to_string(),
                "list".to_string(),
                format!("--project={project}"),
                format!("--region={location}"),
                format!("--cluster={cluster}"),
                format!("--config={}", short_name(&config.name)),
                "--format=json".to_string(),
            ])?;

            let raw: Vec<RawWorkstation> =
                serde_json::from_str(&stdout).context("invalid JSON from gcloud workstations list")?;

            for workstation in raw {
                workstations.push(WorkstationInfo {
                    name: workstation.name,
                    state: workstation.state,
                    env: workstation.env,
                    config: config.clone(),
                });
            }
        }

        Ok(workstations)
    }

    fn create_workstation(&self, request: &CreateRequest) -> Result<()> {
        let descriptor = &request.descriptor;
        let mut args = vec![
            "workstations".to_string(),
            "create".to_string(),
            descriptor.name.clone(),
        ];
        args.extend(Self::scope_args(descriptor));
        if !request.env.is_empty() {
            let pairs: Vec<String> = request
                .env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            args.push(format!("--env={}", pairs.join(",")));
        }
        args.push("--format=json".to_string());

        match self.run(&args) {
            Ok(_) => Ok(()),
            Err(err) => {
                if is_already_exists(&err) {
                    return Err(ApiError::AlreadyExists {
                        name: descriptor.name.clone(),
                    }
                    .into());
                }
                Err(err)
            }
        }
    }

    fn start_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<StartedWorkstation> {
        let mut args = vec![
            "workstations".to_string(),
            "start".to_string(),
            descriptor.name.clone(),
        ];
        args.extend(Self::scope_args(descriptor));
        args.push("--format=json".to_string());

        let stdout = self.run(&args)?;
        let raw: RawStarted =
            serde_json::from_str(&stdout).context("invalid JSON from gcloud workstations start")?;

        Ok(StartedWorkstation { host: raw.host })
    }

    fn stop_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<StoppedWorkstation> {
        let mut args = vec![
            "workstations".to_string(),
            "stop".to_string(),
            descriptor.name.clone(),
        ];
        args.extend(Self::scope_args(descriptor));
        args.push("--format=json".to_string());

        let stdout = self.run(&args)?;
        let raw: RawStopped =
            serde_json::from_str(&stdout).context("invalid JSON from gcloud workstations stop")?;

        Ok(StoppedWorkstation {
            name: raw.name,
            state: raw.state,
        })
    }

    fn delete_workstation(&self, descriptor: &WorkstationDescriptor) -> Result<()> {
        let mut args = vec![
            "workstations".to_string(),
            "delete".to_string(),
            descriptor.name.clone(),
            "--quiet".to_string(),
        ];
        args.extend(Self::scope_args(descriptor));

        self.run(&args)?;
        Ok(())
    }
}

fn summarize_configs(raw: Vec<RawConfig>) -> Vec<ConfigSummary> {
    let mut configs = Vec::with_capacity(raw.len());

    for config in raw {
        let machine_type = config.host.gce_instance.machine_type;
        let Some(machine) = machines::lookup(&machine_type) else {
            debug!("{machine_type} not present in the machine catalog, skipping {}", config.name);
            continue;
        };

        configs.push(ConfigSummary {
            name: config.name,
            image: config.container.image,
            machine_specs: machine.specs(),
            machine_type,
            idle_timeout_secs: duration_secs(&config.idle_timeout),
            max_runtime_secs: duration_secs(&config.running_timeout),
        });
    }

    configs
}

fn is_already_exists(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::CommandFailed { stderr, .. }) => {
            stderr.contains("ALREADY_EXISTS") || stderr.contains("alreadyExists")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIGS: &str = r#"[
        {
            "name": "projects/p/locations/us-central1/workstationClusters/c/workstationConfigs/cfg",
            "container": {"image": "ghcr.io/acme/dev:latest"},
            "host": {"gceInstance": {"machineType": "e2-standard-4"}},
            "idleTimeout": "1200s",
            "runningTimeout": "43200s"
        },
        {
            "name": "projects/p/locations/us-central1/workstationClusters/c/workstationConfigs/weird",
            "host": {"gceInstance": {"machineType": "z9-mega-1024"}}
        }
    ]"#;

    #[test]
    fn parses_duration_strings() {
        assert_eq!(duration_secs("1200s"), 1200.0);
        assert_eq!(duration_secs("0s"), 0.0);
        assert_eq!(duration_secs("garbage"), 0.0);
    }

    #[test]
    fn shortens_resource_names() {
        assert_eq!(
            short_name("projects/p/locations/l/workstationConfigs/cfg"),
            "cfg"
        );
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn summarizes_configs_and_skips_unknown_machine_types() {
        let raw: Vec<RawConfig> = serde_json::from_str(SAMPLE_CONFIGS).expect("parse");
        let configs = summarize_configs(raw);

        assert_eq!(configs.len(), 1);
        let config = &configs[0];
        assert_eq!(config.machine_type, "e2-standard-4");
        assert_eq!(config.image, "ghcr.io/acme/dev:latest");
        assert_eq!(config.machine_specs, "machine_specs[4 vCPUs, 16 GB]");
        assert_eq!(config.idle_timeout_secs, 1200.0);
        assert_eq!(config.max_runtime_secs, 43200.0);
    }

    #[cfg(unix)]
    fn command_failed(stderr: &str) -> anyhow::Error {
        use std::os::unix::process::ExitStatusExt;

        ApiError::CommandFailed {
            command: "gcloud workstations create ws1".to_string(),
            status: std::process::ExitStatus::from_raw(1 << 8),
            stderr: stderr.to_string(),
        }
        .into()
    }

    #[test]
    #[cfg(unix)]
    fn classifies_already_exists_from_stderr() {
        let err =
            command_failed("ERROR: (gcloud.workstations.create) ALREADY_EXISTS: resource exists");
        assert!(is_already_exists(&err));
    }

    #[test]
    #[cfg(unix)]
    fn other_failures_are_not_already_exists() {
        let err = command_failed("ERROR: PERMISSION_DENIED");
        assert!(!is_already_exists(&err));
    }

    #[test]
    fn deserializes_cluster_listings() {
        let raw: Vec<Cluster> = serde_json::from_str(
            r#"[{"name": "projects/p/locations/l/workstationClusters/c",
                 "subnetwork": "projects/p/regions/l/subnetworks/default"},
                {"name": "projects/p/locations/l/workstationClusters/bare"}]"#,
        )
        .expect("parse");

        assert_eq!(short_name(&raw[0].name), "c");
        assert!(raw[0].subnetwork.ends_with("/default"));
        assert_eq!(raw[1].subnetwork, "");
    }

    #[test]
    fn deserializes_workstation_listings() {
        let raw: Vec<RawWorkstation> = serde_json::from_str(
            r#"[{"name": "projects/.../workstations/ws1",
                 "state": "STATE_RUNNING",
                 "env": {"LDAP": "alice", "ACCOUNT": "alice@example.com"}}]"#,
        )
        .expect("parse");

        assert_eq!(raw[0].state, "STATE_RUNNING");
        assert_eq!(raw[0].env.get("LDAP").map(String::as_str), Some("alice"));
    }
}
