//! Plain-text tree rendering for listings. Renderers return lines instead
//! of printing so tests can assert on the exact output.

use crate::api::{ConfigSummary, WorkstationInfo, short_name};

pub fn state_label(state: &str) -> &'static str {
    match state {
        "STATE_RUNNING" => "Running",
        "STATE_STOPPED" => "Stopped",
        "STATE_STARTING" => "Starting",
        "STATE_STOPPING" => "Stopping",
        _ => "State unknown",
    }
}

fn branch_prefixes(last: bool) -> (&'static str, &'static str) {
    if last { ("└── ", "    ") } else { ("├── ", "│   ") }
}

fn push_branch(lines: &mut Vec<String>, label: String, children: Vec<String>, last: bool) {
    let (head, indent) = branch_prefixes(last);
    lines.push(format!("{head}{label}"));

    let count = children.len();
    for (index, child) in children.into_iter().enumerate() {
        let (child_head, _) = branch_prefixes(index + 1 == count);
        lines.push(format!("{indent}{child_head}{child}"));
    }
}

pub fn config_tree(configs: &[ConfigSummary]) -> Vec<String> {
    let mut lines = vec!["Configs".to_string()];

    let count = configs.len();
    for (index, config) in configs.iter().enumerate() {
        push_branch(
            &mut lines,
            format!("Config: {}", short_name(&config.name)),
            vec![
                format!("Image: {}", config.image),
                format!("Machine Type: {}", config.machine_type),
                format!("Machine Specs: {}", config.machine_specs),
                format!("Idle Timeout (s): {}", config.idle_timeout_secs),
                format!("Max Runtime (s): {}", config.max_runtime_secs),
            ],
            index + 1 == count,
        );
    }

    lines
}

/// Render the workstation tree. `user_filter` keeps only workstations
/// whose `LDAP` env entry matches; `None` (the `--all` flag) keeps
/// everything. Returns the lines and the number of workstations shown.
pub fn workstation_tree(
    workstations: &[WorkstationInfo],
    user_filter: Option<&str>,
) -> (Vec<String>, usize) {
    let mut lines = vec!["Workstations".to_string()];

    let visible: Vec<&WorkstationInfo> = workstations
        .iter()
        .filter(|workstation| owned_by(workstation, user_filter))
        .collect();

    let count = visible.len();
    for (index, workstation) in visible.iter().enumerate() {
        let user = workstation
            .env
            .get("LDAP")
            .map(String::as_str)
            .unwrap_or("unknown");

        push_branch(
            &mut lines,
            format!("Workstation: {}", short_name(&workstation.name)),
            vec![
                state_label(&workstation.state).to_string(),
                format!("User: {user}"),
                format!("Image: {}", workstation.config.image),
                format!("Machine Type: {}", workstation.config.machine_type),
                format!("Idle Timeout (s): {}", workstation.config.idle_timeout_secs),
                format!("Max Runtime (s): {}", workstation.config.max_runtime_secs),
            ],
            index + 1 == count,
        );
    }

    (lines, count)
}

pub fn owned_by(workstation: &WorkstationInfo, user_filter: Option<&str>) -> bool {
    match user_filter {
        None => true,
        Some(user) => workstation.env.get("LDAP").map(String::as_str) == Some(user),
    }
}
