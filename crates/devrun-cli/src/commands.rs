//! CLI command implementations

use crate::{AttachArgs, ProjectArgs, RunArgs};
use anyhow::{anyhow, Context, Result};
use devrun_config::GlobalConfig;
use devrun_core::ssh::{self, SshTarget};
use devrun_core::{launch, CoreError, DevProject, DevRunner, RunOptions};
use devrun_provider::{create_manager, ContainerManager};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Create and start the project container, printing its id
pub async fn run(config: &GlobalConfig, args: RunArgs, cancel: &CancellationToken) -> Result<()> {
    let project = project(&args.project)?;
    let options = RunOptions {
        home_dir: home_dir(args.home_dir)?,
        user: args.user.unwrap_or_else(|| config.defaults.user.clone()),
        host: args.host.unwrap_or_else(|| config.defaults.host.clone()),
        ssh_port: args.container_ssh_port.unwrap_or(config.defaults.ssh_port),
        network: args
            .network
            .unwrap_or_else(|| config.defaults.network.clone()),
        interactive: args.interactive,
        env: args.env,
        engine_socket: None,
    };

    let manager = manager(config, args.project.backend.as_deref())?;
    let id = launch(manager, &project, &options, cancel)
        .await
        .context("start container failed")?;
    println!("{}", id);
    Ok(())
}

/// Stop and remove the project container
pub async fn stop(
    config: &GlobalConfig,
    args: ProjectArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let project = project(&args)?;
    let runner = connect(manager(config, args.backend.as_deref())?, cancel).await?;
    runner
        .stop(&project, cancel)
        .await
        .context("stop container failed")?;
    Ok(())
}

/// Copy the container's log history to stdout
pub async fn logs(
    config: &GlobalConfig,
    args: ProjectArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let project = project(&args)?;
    let runner = connect(manager(config, args.backend.as_deref())?, cancel).await?;
    let mut stdout = tokio::io::stdout();
    runner
        .logs(&project, &mut stdout, cancel)
        .await
        .context("cannot print container logs")?;
    Ok(())
}

/// Print `name=value` per image label
pub async fn labels(
    config: &GlobalConfig,
    backend: Option<String>,
    image: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let image = required_image(image.as_deref())?;
    let runner = connect(manager(config, backend.as_deref())?, cancel).await?;
    for label in runner.image_labels(image, cancel).await? {
        println!("{}={}", label.name, label.value);
    }
    Ok(())
}

/// Interactive SSH session into the running container
pub fn attach(config: &GlobalConfig, args: AttachArgs) -> Result<()> {
    // validates image and work dir even though only the SSH endpoint is used
    project(&ProjectArgs {
        backend: None,
        image: args.image,
        work_dir: args.work_dir,
    })?;
    let home_dir = home_dir(args.home_dir)?;
    let target = SshTarget {
        host: args.host.unwrap_or_else(|| config.defaults.host.clone()),
        port: args.port.unwrap_or(config.defaults.ssh_port),
        user: args.user.unwrap_or_else(|| config.defaults.user.clone()),
        password: args
            .password
            .unwrap_or_else(|| config.defaults.password.clone()),
    };
    ssh::attach(&target, &home_dir).context("cannot connect")?;
    Ok(())
}

/// `load` and `unload` accept their flags and do nothing yet
pub fn reserved(command: &str, backend: Option<String>) -> Result<()> {
    tracing::debug!(
        "'{}' is reserved (backend {})",
        command,
        backend.as_deref().unwrap_or("default")
    );
    Ok(())
}

fn required_image(image: Option<&str>) -> Result<&str> {
    match image {
        Some(image) if !image.trim().is_empty() => Ok(image),
        _ => Err(CoreError::Validation("'image' must be set with image tag".to_string()).into()),
    }
}

fn project(args: &ProjectArgs) -> Result<DevProject> {
    let image = required_image(args.image.as_deref())?;
    let work_dir = match &args.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot read current directory")?,
    };
    Ok(DevProject::new(image, absolute(work_dir))?)
}

fn home_dir(arg: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match arg {
        Some(dir) => dir,
        None => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| anyhow!("cannot determine home directory; pass --home-dir"))?,
    };
    Ok(absolute(dir))
}

/// Canonical form so `.` and trailing separators yield a real basename
fn absolute(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

fn manager(config: &GlobalConfig, backend: Option<&str>) -> Result<Box<dyn ContainerManager>> {
    let name = backend.unwrap_or(&config.defaults.backend);
    create_manager(name, config).context("cannot create container manager")
}

async fn connect(
    manager: Box<dyn ContainerManager>,
    cancel: &CancellationToken,
) -> Result<DevRunner> {
    DevRunner::connect(manager, cancel)
        .await
        .context("container manager initialization failed")
}
