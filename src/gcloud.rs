use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::process::Command;

use crate::api::ApiError;
use crate::paths;

/// Defaults read from the gcloud CLI's own configuration
/// (`~/.config/gcloud/configurations/config_default`), used as fallbacks
/// when `--project` / `--location` are not passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcloudDefaults {
    pub project: Option<String>,
    pub region: Option<String>,
    pub account: Option<String>,
}

/// Fully resolved cloud context every remote operation runs against.
#[derive(Debug, Clone)]
pub struct CloudContext {
    pub project: String,
    pub location: String,
    pub account: String,
}

pub fn read_defaults() -> Result<GcloudDefaults> {
    let path = paths::gcloud_config_path()?;
    if !path.exists() {
        return Ok(GcloudDefaults::default());
    }

    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;

    Ok(parse_defaults(&raw))
}

fn parse_defaults(raw: &str) -> GcloudDefaults {
    let mut defaults = GcloudDefaults::default();
    let mut section = "";

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = &line[1..line.len() - 1];
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if value.is_empty() {
            continue;
        }
        match (section, key) {
            ("core", "project") => defaults.project = Some(value.to_string()),
            ("core", "account") => defaults.account = Some(value.to_string()),
            ("compute", "region") => defaults.region = Some(value.to_string()),
            _ => {}
        }
    }

    defaults
}

pub fn resolve_context(project: Option<String>, location: Option<String>) -> Result<CloudContext> {
    resolve_context_with(read_defaults()?, project, location)
}

fn resolve_context_with(
    defaults: GcloudDefaults,
    project: Option<String>,
    location: Option<String>,
) -> Result<CloudContext> {
    let project = project
        .or(defaults.project)
        .context("project not found in gcloud config and was not passed in (use --project)")?;
    let location = location
        .or(defaults.region)
        .context("location not found in gcloud config and was not passed in (use --location)")?;
    let account = defaults
        .account
        .context("account not found in gcloud config, run `gcloud auth login` first")?;

    Ok(CloudContext {
        project,
        location,
        account,
    })
}

/// Credential preflight, run before any remote call so a stale login fails
/// with a remediation hint instead of a provider error mid-command.
pub fn check_auth() -> Result<()> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token", "--quiet"])
        .output()
        .context("failed to run gcloud (is the gcloud CLI on PATH?)")?;

    if !output.status.success() {
        return Err(ApiError::Auth.into());
    }

    Ok(())
}

pub fn current_user() -> Result<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .context("could not determine the local user from USER/USERNAME")
}
