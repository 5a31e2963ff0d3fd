use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::paths;
use crate::ports;
use crate::tunnel;

const DESCRIPTOR_KEYS: [&str; 5] = ["project", "name", "location", "cluster", "config"];

/// Identity of one remote workstation, persisted as
/// `~/.workstations/configs/<name>.yml` when the workstation is created
/// and read back by every later start/stop/delete/sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkstationDescriptor {
    pub project: String,
    pub name: String,
    pub location: String,
    pub cluster: String,
    pub config: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("workstation `{name}` not found, please check if {} exists", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("descriptor for `{name}` is missing keys [{}]", missing.join(", "))]
    MissingKeys { name: String, missing: Vec<String> },
}

/// Local store for workstation descriptors and their SSH config stanzas.
/// Constructed explicitly and passed to the commands so tests can point it
/// at a temp directory.
pub struct ConfigStore {
    configs_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(configs_dir: PathBuf) -> Self {
        Self { configs_dir }
    }

    pub fn open_default() -> Result<Self> {
        paths::ensure_home_layout()?;
        Ok(Self::new(paths::configs_dir()?))
    }

    pub fn descriptor_path(&self, name: &str) -> PathBuf {
        self.configs_dir.join(format!("{name}.yml"))
    }

    pub fn ssh_config_path(&self, name: &str) -> PathBuf {
        self.configs_dir.join(format!("{name}.config"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.descriptor_path(name).exists()
    }

    pub fn write_descriptor(&self, descriptor: &WorkstationDescriptor) -> Result<PathBuf> {
        fs::create_dir_all(&self.configs_dir)
            .with_context(|| format!("failed to create {}", self.configs_dir.display()))?;

        let path = self.descriptor_path(&descriptor.name);
        let raw = serde_yaml::to_string(descriptor)?;
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(path)
    }

    pub fn read_descriptor(&self, name: &str) -> Result<WorkstationDescriptor> {
        let path = self.descriptor_path(name);
        if !path.exists() {
            return Err(ConfigError::NotFound {
                name: name.to_string(),
                path,
            }
            .into());
        }

        let raw =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let value: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?;

        let missing: Vec<String> = DESCRIPTOR_KEYS
            .iter()
            .copied()
            .filter(|key| value.get(*key).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys {
                name: name.to_string(),
                missing,
            }
            .into());
        }

        let descriptor: WorkstationDescriptor = serde_yaml::from_value(value)
            .with_context(|| format!("invalid descriptor in {}", path.display()))?;

        Ok(descriptor)
    }

    /// Remove both the YAML descriptor and the SSH stanza. Both must exist;
    /// a missing file means the workstation was never created locally.
    pub fn delete(&self, name: &str) -> Result<()> {
        let descriptor = self.descriptor_path(name);
        let ssh_config = self.ssh_config_path(name);

        for path in [&ssh_config, &descriptor] {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    name: name.to_string(),
                    path: path.clone(),
                }
                .into());
            }
        }

        fs::remove_file(&ssh_config)
            .with_context(|| format!("failed to remove {}", ssh_config.display()))?;
        fs::remove_file(&descriptor)
            .with_context(|| format!("failed to remove {}", descriptor.display()))?;

        Ok(())
    }

    /// Ports already claimed by existing SSH stanzas. Files without a
    /// parseable `Port` line contribute nothing.
    pub fn claimed_ports(&self) -> Result<Vec<u16>> {
        let mut claimed = Vec::new();
        if !self.configs_dir.exists() {
            return Ok(claimed);
        }

        for entry in fs::read_dir(&self.configs_dir)
            .with_context(|| format!("failed to read {}", self.configs_dir.display()))?
        {
            let entry = entry
                .with_context(|| format!("failed to read {}", self.configs_dir.display()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("config") {
                continue;
            }

            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if let Some(port) = parse_stanza_port(&contents) {
                claimed.push(port);
            }
        }

        Ok(claimed)
    }

    /// Allocate a port and write the SSH stanza for the workstation.
    /// Returns the allocated port.
    pub fn write_ssh_config(&self, descriptor: &WorkstationDescriptor, user: &str) -> Result<u16> {
        fs::create_dir_all(&self.configs_dir)
            .with_context(|| format!("failed to create {}", self.configs_dir.display()))?;

        let claimed = self.claimed_ports()?;
        let port = ports::allocate_port(&claimed, ports::SSH_BASE_PORT)?;

        let proxy = tunnel::proxy_command(
            &descriptor.project,
            &descriptor.cluster,
            &descriptor.config,
            &descriptor.location,
        );
        let stanza = tunnel::ssh_stanza(&descriptor.name, user, port, &proxy);

        let path = self.ssh_config_path(&descriptor.name);
        fs::write(&path, stanza)
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(port)
    }
}

fn parse_stanza_port(contents: &str) -> Option<u16> {
    for line in contents.lines() {
        if let Some(rest) = line.trim().strip_prefix("Port ") {
            if let Ok(port) = rest.trim().parse::<u16>() {
                return Some(port);
            }
        }
    }
    None
}
