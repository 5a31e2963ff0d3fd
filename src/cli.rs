use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(
    version = env!("VERSION"),
    about = "Cloud workstation manager",
    long_about = None,
    long_version = concat!(
        "version ",
        env!("VERSION"),
        "\n",
        "  commit: ",
        env!("COMMIT"),
        "\n",
        "  built at: ",
        env!("DATE"),
        "\n",
        "  rust version: ",
        env!("RUSTC_VERSION"),
        "\n",
        "  platform: ",
        env!("OS"),
        "/",
        env!("ARCH")
    )
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct ScopeArgs {
    /// Cloud project, defaults to the gcloud config value.
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// Workstation location, defaults to the gcloud compute region.
    #[arg(short = 'l', long)]
    pub location: Option<String>,

    /// Cluster used for workstations.
    #[arg(long, default_value = "cluster-public")]
    pub cluster: String,

    /// Name of the workstation config.
    #[arg(short = 'c', long)]
    pub config: Option<String>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Name of the workstation to create.
    #[arg(long)]
    pub name: String,

    /// Proxy URL injected into the workstation environment.
    #[arg(long)]
    pub proxy: Option<String>,

    /// No-proxy list injected alongside --proxy.
    #[arg(long = "no-proxy")]
    pub no_proxy: Option<String>,

    /// Extra environment variables for the workstation.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Print JSON output.
    #[arg(long)]
    pub json: bool,

    /// List workstations only from a given user.
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// List workstations from all users.
    #[arg(short = 'a', long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Name of the workstation to sync.
    #[arg(long)]
    pub name: String,

    /// Local source directory.
    #[arg(long, default_value = "~/remote-machines/workstation/")]
    pub source: String,

    /// Destination directory on the workstation.
    #[arg(long, default_value = "~/")]
    pub destination: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a workstation.
    Create(CreateArgs),

    /// List workstations.
    List(ListArgs),

    /// List workstation configurations.
    #[command(name = "list-configs")]
    ListConfigs {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Start a workstation.
    Start {
        /// Name of the workstation to start.
        #[arg(short = 'n', long)]
        name: String,

        /// Open the workstation in VSCode locally.
        #[arg(long)]
        code: bool,

        /// Open the workstation in a web browser.
        #[arg(long)]
        browser: bool,
    },

    /// Stop a workstation.
    Stop {
        /// Name of the workstation to stop.
        #[arg(long)]
        name: String,
    },

    /// Delete a workstation.
    Delete {
        /// Name of the workstation to delete.
        #[arg(long)]
        name: String,
    },

    /// Sync files to a workstation.
    Sync(SyncArgs),

    /// Open the cloud console logs for a workstation's VM.
    Logs {
        #[arg(value_name = "name")]
        name: String,

        /// Cloud project of the workstation.
        #[arg(long)]
        project: Option<String>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    commands::run(cli)
}
