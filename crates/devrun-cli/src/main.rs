//! dev-runner - per-project development containers on Docker or Podman

mod commands;

use clap::{Args, Parser, Subcommand};
use devrun_config::GlobalConfig;
use devrun_provider::EnvironmentVariable;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dev-runner")]
#[command(author, version, about = "Per-project development containers", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags identifying the project container
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Container manager: docker or podman
    #[arg(long, visible_alias = "cm")]
    pub backend: Option<String>,

    /// Dev image tag
    #[arg(long)]
    pub image: Option<String>,

    /// Work dir on host mounted at /work (default: current directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Home dir on host to share .ssh, .docker and .gitconfig from
    #[arg(long)]
    pub home_dir: Option<PathBuf>,

    /// User inside the container
    #[arg(long)]
    pub user: Option<String>,

    /// Host interface to bind the container SSH port to
    #[arg(long)]
    pub host: Option<String>,

    /// Host port for the container SSH server
    #[arg(long)]
    pub container_ssh_port: Option<u16>,

    /// Network mode: bridge, host or nat
    #[arg(long)]
    pub network: Option<String>,

    /// Allocate a TTY and keep stdin open
    #[arg(long)]
    pub interactive: bool,

    /// Extra environment variable NAME=VALUE (repeatable)
    #[arg(long = "env", value_name = "NAME=VALUE")]
    pub env: Vec<EnvironmentVariable>,
}

#[derive(Args, Debug, Clone)]
pub struct AttachArgs {
    /// Dev image tag
    #[arg(long)]
    pub image: Option<String>,

    /// Work dir of the project (default: current directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Home dir whose known_hosts is cleaned
    #[arg(long)]
    pub home_dir: Option<PathBuf>,

    /// Host the container SSH port is bound to
    #[arg(long)]
    pub host: Option<String>,

    /// SSH port on the host
    #[arg(long)]
    pub port: Option<u16>,

    /// Container user
    #[arg(long)]
    pub user: Option<String>,

    /// Container user password
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start the project container
    Run(RunArgs),

    /// Stop and remove the project container with its volumes
    Stop(ProjectArgs),

    /// Print the project container's logs
    Logs(ProjectArgs),

    /// Print the labels of an image
    Labels {
        /// Container manager: docker or podman
        #[arg(long, visible_alias = "cm")]
        backend: Option<String>,

        /// Image tag
        #[arg(long)]
        image: Option<String>,
    },

    /// Open an SSH session into the running container
    Attach(AttachArgs),

    /// Reserved
    Load {
        #[arg(long, visible_alias = "cm")]
        backend: Option<String>,
    },

    /// Reserved
    Unload {
        #[arg(long, visible_alias = "cm")]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match GlobalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration: {}", e);
            GlobalConfig::default()
        }
    };

    // Ctrl-C aborts the pending engine call
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Run(args) => commands::run(&config, args, &cancel).await,
        Commands::Stop(args) => commands::stop(&config, args, &cancel).await,
        Commands::Logs(args) => commands::logs(&config, args, &cancel).await,
        Commands::Labels { backend, image } => {
            commands::labels(&config, backend, image, &cancel).await
        }
        Commands::Attach(args) => commands::attach(&config, args),
        Commands::Load { backend } => commands::reserved("load", backend),
        Commands::Unload { backend } => commands::reserved("unload", backend),
    }
}
