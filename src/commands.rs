use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::BufRead;

use crate::api::{CreateRequest, GcloudApi, WorkstationInfo, WorkstationsApi, short_name};
use crate::cli::{Cli, Command, CreateArgs, ListArgs, ScopeArgs, SyncArgs};
use crate::config::{ConfigStore, WorkstationDescriptor};
use crate::gcloud;
use crate::logs;
use crate::proxy::{self, ProxySettings};
use crate::render;
use crate::tunnel;

pub fn run(cli: Cli) -> Result<()> {
    let api = GcloudApi;

    match cli.command {
        Command::Create(args) => create(&api, args),
        Command::List(args) => list(&api, args),
        Command::ListConfigs { scope } => list_configs(&api, scope),
        Command::Start {
            name,
            code,
            browser,
        } => start(&api, &name, code, browser),
        Command::Stop { name } => stop(&api, &name),
        Command::Delete { name } => delete(&api, &name),
        Command::Sync(args) => sync(args),
        Command::Logs { name, project } => open_logs(&name, project),
    }
}

fn create(api: &dyn WorkstationsApi, args: CreateArgs) -> Result<()> {
    gcloud::check_auth()?;

    let context = gcloud::resolve_context(args.scope.project, args.scope.location)?;
    let config = args
        .scope
        .config
        .context("--config is required to create a workstation")?;
    let user = gcloud::current_user()?;
    let store = ConfigStore::open_default()?;

    if store.exists(&args.name) {
        println!("Workstation config for {} already exists.", args.name);
        if !confirm("Overwrite config?")? {
            println!("Exiting without creating workstation {}.", args.name);
            return Ok(());
        }
    }

    let proxy = match (args.proxy, args.no_proxy) {
        (Some(proxy), no_proxy) => Some(ProxySettings { proxy, no_proxy }),
        (None, _) => proxy::provider_from_env().resolve(&context.project, &args.name),
    };

    let extras = parse_env_pairs(&args.env)?;
    let env = build_create_env(&user, &context.account, proxy.as_ref(), &extras);

    let descriptor = WorkstationDescriptor {
        project: context.project,
        name: args.name.clone(),
        location: context.location,
        cluster: args.scope.cluster,
        config,
    };

    api.create_workstation(&CreateRequest {
        descriptor: descriptor.clone(),
        env,
    })?;

    // The remote resource now exists; a failure past this point leaves it
    // without local files, and the error names the path to recreate.
    store.write_descriptor(&descriptor)?;
    store.write_ssh_config(&descriptor, &user)?;

    println!("Workstation {} created.", args.name);

    Ok(())
}

fn list(api: &dyn WorkstationsApi, args: ListArgs) -> Result<()> {
    gcloud::check_auth()?;

    let context = gcloud::resolve_context(args.scope.project, args.scope.location)?;
    let workstations =
        api.list_workstations(&context.project, &context.location, &args.scope.cluster)?;

    let user = match args.user {
        Some(user) => user,
        None => gcloud::current_user()?,
    };
    let filter = if args.all { None } else { Some(user.as_str()) };

    if args.json {
        let records = workstation_records(&workstations, filter, &context, &args.scope.cluster);
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let (lines, count) = render::workstation_tree(&workstations, filter);
    for line in lines {
        println!("{line}");
    }
    println!("Total Workstations: {count}");

    Ok(())
}

fn list_configs(api: &dyn WorkstationsApi, scope: ScopeArgs) -> Result<()> {
    gcloud::check_auth()?;

    let context = gcloud::resolve_context(scope.project, scope.location)?;
    let configs = api.list_configs(&context.project, &context.location, &scope.cluster)?;

    for line in render::config_tree(&configs) {
        println!("{line}");
    }

    Ok(())
}

fn start(api: &dyn WorkstationsApi, name: &str, code: bool, browser: bool) -> Result<()> {
    gcloud::check_auth()?;

    if code && browser {
        bail!("select either local VSCode (--code) or remote VSCode in web browser (--browser)");
    }

    let store = ConfigStore::open_default()?;
    let descriptor = store.read_descriptor(name)?;

    println!("Waiting for operation to complete (~3 minutes)...");
    let started = api.start_workstation(&descriptor)?;
    let url = format!("https://80-{}", started.host);

    if code {
        let user = gcloud::current_user()?;
        let vscode_url = format!("vscode://vscode-remote/ssh-remote+{name}/home/{user}");
        println!("Opening workstation in VSCode...");
        webbrowser::open(&vscode_url).context("failed to open VSCode URL")?;
    } else if browser {
        println!("Opening workstation at {url}...");
        webbrowser::open(&url).context("failed to open browser")?;
    } else {
        println!("Use --browser or --code to open the workstation in browser or vs code directly.");
        println!("{url}");
    }

    Ok(())
}

fn stop(api: &dyn WorkstationsApi, name: &str) -> Result<()> {
    gcloud::check_auth()?;

    let store = ConfigStore::open_default()?;
    let descriptor = store.read_descriptor(name)?;

    println!("Waiting for operation to complete...");
    let stopped = api.stop_workstation(&descriptor)?;
    println!("{} {}", short_name(&stopped.name), stopped.state);

    Ok(())
}

fn delete(api: &dyn WorkstationsApi, name: &str) -> Result<()> {
    gcloud::check_auth()?;

    let store = ConfigStore::open_default()?;
    let descriptor = store.read_descriptor(name)?;

    println!("Waiting for operation to complete...");
    api.delete_workstation(&descriptor)?;
    store.delete(name)?;

    println!("Workstation {name} deleted.");

    Ok(())
}

fn sync(args: SyncArgs) -> Result<()> {
    gcloud::check_auth()?;

    let store = ConfigStore::open_default()?;
    let descriptor = store.read_descriptor(&args.name)?;

    let outcome = tunnel::sync_files(&descriptor, &args.source, &args.destination)?;

    for line in outcome.stdout.lines() {
        println!("{line}");
    }

    if !outcome.success {
        eprintln!("{}", outcome.command.join(" "));
        eprintln!("{}", outcome.stderr.trim_end());
        match outcome.exit_code {
            Some(code) => bail!("rsync exited with status {code}"),
            None => bail!("rsync was terminated by signal"),
        }
    }

    Ok(())
}

fn open_logs(name: &str, project: Option<String>) -> Result<()> {
    gcloud::check_auth()?;

    let project = match project {
        Some(project) => project,
        None => gcloud::read_defaults()?
            .project
            .context("project not found in gcloud config and was not passed in (use --project)")?,
    };

    let assignments = logs::instance_assignments(&project)?;
    let Some(assignment) = assignments.get(name) else {
        bail!("workstation {name} not found in the last 24 hours of assignment logs");
    };

    println!("Logs for instance: {} opening", assignment.instance_name);
    webbrowser::open(&assignment.logs_url).context("failed to open browser")?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct WorkstationRecord {
    name: String,
    user: String,
    project: String,
    location: String,
    config: String,
    cluster: String,
    state: String,
    idle_timeout: f64,
    max_runtime: f64,
    #[serde(rename = "type")]
    machine_type: String,
    image: String,
}

fn workstation_records(
    workstations: &[WorkstationInfo],
    user_filter: Option<&str>,
    context: &gcloud::CloudContext,
    cluster: &str,
) -> Vec<WorkstationRecord> {
    workstations
        .iter()
        .filter(|workstation| render::owned_by(workstation, user_filter))
        .map(|workstation| WorkstationRecord {
            name: short_name(&workstation.name).to_string(),
            user: workstation
                .env
                .get("LDAP")
                .cloned()
                .unwrap_or_default(),
            project: context.project.clone(),
            location: context.location.clone(),
            config: short_name(&workstation.config.name).to_string(),
            cluster: cluster.to_string(),
            state: workstation.state.clone(),
            idle_timeout: workstation.config.idle_timeout_secs,
            max_runtime: workstation.config.max_runtime_secs,
            machine_type: workstation.config.machine_type.clone(),
            image: workstation.config.image.clone(),
        })
        .collect()
}

/// Env baked into a new workstation: the owner identity, proxy settings
/// when configured, and user extras. Extras never shadow the reserved
/// keys.
fn build_create_env(
    user: &str,
    account: &str,
    proxy: Option<&ProxySettings>,
    extras: &[(String, String)],
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("LDAP".to_string(), user.to_string());
    env.insert("ACCOUNT".to_string(), account.to_string());

    if let Some(settings) = proxy {
        for key in ["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"] {
            env.insert(key.to_string(), settings.proxy.clone());
        }
        if let Some(no_proxy) = &settings.no_proxy {
            env.insert("no_proxy".to_string(), no_proxy.clone());
            env.insert("NO_PROXY".to_string(), no_proxy.clone());
        }
    }

    for (key, value) in extras {
        if env.contains_key(key) {
            eprintln!("warning: environment variable {key} already exists in the environment, skipping");
            continue;
        }
        env.insert(key.clone(), value.clone());
    }

    env
}

fn parse_env_pairs(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("invalid --env `{pair}`: expected KEY=VALUE"),
        })
        .collect()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    use std::io::Write;
    std::io::stdout().flush().ok();

    let stdin = std::io::stdin();
    confirm_from(&mut stdin.lock())
}

fn confirm_from(reader: &mut dyn BufRead) -> Result<bool> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read confirmation")?;

    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ConfigSummary;

    #[test]
    fn create_env_seeds_owner_identity() {
        let env = build_create_env("alice", "alice@example.com", None, &[]);

        assert_eq!(env.get("LDAP").map(String::as_str), Some("alice"));
        assert_eq!(
            env.get("ACCOUNT").map(String::as_str),
            Some("alice@example.com")
        );
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn create_env_spreads_proxy_variables() {
        let proxy = ProxySettings {
            proxy: "http://proxy:3128".to_string(),
            no_proxy: Some("localhost".to_string()),
        };

        let env = build_create_env("alice", "a@b", Some(&proxy), &[]);

        for key in ["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"] {
            assert_eq!(env.get(key).map(String::as_str), Some("http://proxy:3128"));
        }
        assert_eq!(env.get("no_proxy").map(String::as_str), Some("localhost"));
        assert_eq!(env.get("NO_PROXY").map(String::as_str), Some("localhost"));
    }

    #[test]
    fn create_env_extras_do_not_shadow_reserved_keys() {
        let extras = vec![
            ("LDAP".to_string(), "mallory".to_string()),
            ("FOO".to_string(), "bar".to_string()),
        ];

        let env = build_create_env("alice", "a@b", None, &extras);

        assert_eq!(env.get("LDAP").map(String::as_str), Some("alice"));
        assert_eq!(env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn env_pairs_require_key_value_form() {
        let pairs =
            parse_env_pairs(&["FOO=bar".to_string(), "BAZ=a=b".to_string()]).expect("parse");
        assert_eq!(
            pairs,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("BAZ".to_string(), "a=b".to_string()),
            ]
        );

        assert!(parse_env_pairs(&["novalue".to_string()]).is_err());
        assert!(parse_env_pairs(&["=orphan".to_string()]).is_err());
    }

    #[test]
    fn confirmation_accepts_yes_variants_only() {
        for (input, expected) in [
            ("y\n", true),
            ("Y\n", true),
            ("yes\n", true),
            ("n\n", false),
            ("\n", false),
            ("maybe\n", false),
        ] {
            let mut reader = input.as_bytes();
            assert_eq!(
                confirm_from(&mut reader).expect("confirm"),
                expected,
                "input {input:?}"
            );
        }
    }

    #[test]
    fn records_flatten_and_filter_workstations() {
        use std::collections::BTreeMap;

        let config = ConfigSummary {
            name: "projects/p/workstationConfigs/cfg".to_string(),
            image: "img".to_string(),
            machine_type: "e2-standard-4".to_string(),
            machine_specs: "machine_specs[4 vCPUs, 16 GB]".to_string(),
            idle_timeout_secs: 1200.0,
            max_runtime_secs: 43200.0,
        };
        let mut env = BTreeMap::new();
        env.insert("LDAP".to_string(), "alice".to_string());
        let workstations = vec![
            WorkstationInfo {
                name: "projects/p/workstations/ws1".to_string(),
                state: "STATE_RUNNING".to_string(),
                env: env.clone(),
                config: config.clone(),
            },
            WorkstationInfo {
                name: "projects/p/workstations/ws2".to_string(),
                state: "STATE_STOPPED".to_string(),
                env: BTreeMap::new(),
                config,
            },
        ];
        let context = gcloud::CloudContext {
            project: "p".to_string(),
            location: "us-central1".to_string(),
            account: "a@b".to_string(),
        };

        let records = workstation_records(&workstations, Some("alice"), &context, "c");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "ws1");
        assert_eq!(record.user, "alice");
        assert_eq!(record.config, "cfg");
        assert_eq!(record.state, "STATE_RUNNING");

        let json = serde_json::to_string(&records).expect("serialize");
        assert!(json.contains("\"type\":\"e2-standard-4\""));
    }
}
