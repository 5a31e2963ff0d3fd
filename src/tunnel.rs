use anyhow::{Context, Result, bail};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::config::WorkstationDescriptor;
use crate::paths;
use crate::ports;

const READY_POLL_ATTEMPTS: u32 = 10;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shell command embedded as the per-host SSH ProxyCommand. It backgrounds
/// the provider tunnel on the stanza port, waits for the port to accept
/// connections (10 one-second attempts, then gives up with a non-zero
/// exit), pipes the raw stream over stdin/stdout with `nc`, and kills the
/// tunnel process tree when the SSH client disconnects.
pub fn proxy_command(project: &str, cluster: &str, config: &str, region: &str) -> String {
    format!(
        "sh -c '\
         cleanup() {{ pkill -P $$; }}; \
         trap cleanup EXIT; \
         gcloud workstations start-tcp-tunnel \
         --project={project} \
         --cluster={cluster} \
         --config={config} \
         --region={region} \
         --local-host-port=localhost:%p %h 22 & \
         timeout=10; \
         while ! nc -z localhost %p; do \
         sleep 1; \
         timeout=$((timeout - 1)); \
         if [ $timeout -le 0 ]; then \
         exit 1; \
         fi; \
         done; \
         nc localhost %p'"
    )
}

pub fn ssh_stanza(name: &str, user: &str, port: u16, proxy_command: &str) -> String {
    format!(
        "Host {name}\n\
         \x20   HostName {name}\n\
         \x20   Port {port}\n\
         \x20   User {user}\n\
         \x20   StrictHostKeyChecking no\n\
         \x20   UserKnownHostsFile /dev/null\n\
         \x20   ControlMaster auto\n\
         \x20   ControlPersist 30m\n\
         \x20   ControlPath ~/.ssh/cm/%r@%h:%p\n\
         \x20   ProxyCommand {proxy_command}\n"
    )
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub command: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Background tunnel subprocess, killed when the guard drops so error
/// paths never leak a running gcloud child.
struct TunnelProcess {
    child: Child,
}

impl TunnelProcess {
    fn spawn(descriptor: &WorkstationDescriptor, port: u16) -> Result<Self> {
        let mut child = Command::new("gcloud")
            .args([
                "workstations",
                "start-tcp-tunnel",
                &format!("--project={}", descriptor.project),
                &format!("--cluster={}", descriptor.cluster),
                &format!("--config={}", descriptor.config),
                &format!("--region={}", descriptor.location),
                &descriptor.name,
                "22",
                &format!("--local-host-port=:{port}"),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to start gcloud tunnel (is the gcloud CLI on PATH?)")?;

        // A tunnel that dies immediately (bad flags, expired credentials)
        // should fail the sync up front instead of timing out later.
        if let Some(status) = child
            .try_wait()
            .context("failed to poll gcloud tunnel process")?
        {
            if !status.success() {
                let stderr = read_pipe(&mut child);
                bail!("gcloud tunnel exited early with {status}: {}", stderr.trim());
            }
        }

        Ok(Self { child })
    }

    /// Wait until something is listening on the tunnel port. "The port is
    /// no longer bindable" is a weak readiness signal (an unrelated process
    /// could have taken it) but the tunnel CLI offers nothing better to a
    /// detached caller; bounded to 10 one-second polls, after which the
    /// sync proceeds and surfaces any connection failure from rsync.
    fn wait_ready(&self, port: u16) {
        for _ in 0..READY_POLL_ATTEMPTS {
            if !ports::port_is_free(port) {
                return;
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    }
}

impl Drop for TunnelProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read_pipe(child: &mut Child) -> String {
    use std::io::Read;

    let mut buffer = String::new();
    if let Some(stderr) = child.stderr.as_mut() {
        let _ = stderr.read_to_string(&mut buffer);
    }
    buffer
}

pub fn build_rsync_command(port: u16, source: &str, destination: &str) -> Vec<String> {
    vec![
        "rsync".to_string(),
        "-av".to_string(),
        "--exclude=.venv".to_string(),
        "--exclude=.git".to_string(),
        "--exclude=.DS_Store".to_string(),
        "-e".to_string(),
        format!("ssh -p {port} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null"),
        source.to_string(),
        format!("localhost:{destination}"),
    ]
}

/// Sync a local directory to the workstation over a short-lived tunnel:
/// allocate a port in the sync range, background the tunnel, wait for it
/// to come up, run rsync through it, then tear the tunnel down. The rsync
/// exit status is captured, never retried.
pub fn sync_files(
    descriptor: &WorkstationDescriptor,
    source: &str,
    destination: &str,
) -> Result<SyncOutcome> {
    let port = ports::allocate_port(&[], ports::SYNC_BASE_PORT)
        .context("no local port available for the sync tunnel")?;

    let tunnel = TunnelProcess::spawn(descriptor, port)?;
    tunnel.wait_ready(port);

    let source_path = paths::expand_user(source)?;
    let command = build_rsync_command(port, &source_path.to_string_lossy(), destination);

    let output = Command::new(&command[0])
        .args(&command[1..])
        .output()
        .with_context(|| format!("failed to execute {command:?}"))?;

    drop(tunnel);

    Ok(SyncOutcome {
        command,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}
