//! Project container lifecycle on top of a [`ContainerManager`]
//!
//! [`plan_run`] does all host-side work (validation, naming, mount
//! materialization) and yields a [`RunContainerRequest`]; [`DevRunner`]
//! hands requests to an initialized backend. [`launch`] chains the two.

use crate::fs::is_dir;
use crate::mounts::MountPlanner;
use crate::naming::{dev_home_dir, gen_container_name};
use crate::network::resolve_network_mode;
use crate::{CoreError, Result};
use devrun_provider::{
    ContainerId, ContainerManager, EnvironmentVariable, ImageArchive, Label, LogSink, NetworkMode,
    PortBinding, ProviderType, RunContainerRequest,
};
use std::net::{IpAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// SSH port inside the dev container
pub const CONTAINER_SSH_PORT: u16 = 22;

/// One project: an image tag and the host directory it works on
#[derive(Debug, Clone)]
pub struct DevProject {
    image: String,
    work_dir: PathBuf,
}

impl DevProject {
    pub fn new(image: impl Into<String>, work_dir: impl Into<PathBuf>) -> Result<Self> {
        let image = image.into();
        if image.trim().is_empty() {
            return Err(CoreError::Validation(
                "'image' must be set with image tag".to_string(),
            ));
        }
        let work_dir = work_dir.into();
        if !is_dir(&work_dir) {
            return Err(CoreError::Validation(format!(
                "work dir '{}' must exist and be a directory",
                work_dir.display()
            )));
        }
        Ok(Self { image, work_dir })
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn container_name(&self) -> String {
        gen_container_name(&self.image, &self.work_dir)
    }

    pub fn dev_home_dir(&self) -> PathBuf {
        dev_home_dir(&self.image, &self.work_dir)
    }
}

/// Settings for `run` beyond the project identity
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Host home directory shared files are taken from
    pub home_dir: PathBuf,
    /// User inside the container
    pub user: String,
    /// Host interface the SSH port is published on
    pub host: String,
    /// Host port for the container's SSH port
    pub ssh_port: u16,
    /// Requested network mode name, resolved by [`plan_run`]
    pub network: String,
    pub interactive: bool,
    pub env: Vec<EnvironmentVariable>,
    /// Engine socket override; the default socket path when unset
    pub engine_socket: Option<PathBuf>,
}

impl RunOptions {
    pub fn validate(&self) -> Result<()> {
        if !is_dir(&self.home_dir) {
            return Err(CoreError::Validation(format!(
                "home dir '{}' must exist and be a directory",
                self.home_dir.display()
            )));
        }
        if self.user.is_empty() {
            return Err(CoreError::Validation(
                "'user' must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the `--host` value to an address the engines accept
pub fn bind_address(host: &str) -> Result<String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip.to_string());
    }
    let addrs: Vec<_> = (host, 0)
        .to_socket_addrs()
        .map_err(|e| CoreError::Validation(format!("cannot resolve host '{}': {}", host, e)))?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(|addr| addr.ip().to_string())
        .ok_or_else(|| CoreError::Validation(format!("host '{}' has no address", host)))
}

/// Validate options, materialize host paths and build the run request.
///
/// The network mode is resolved first; nothing on the host is touched
/// until it and the other options check out. Outside host networking
/// the container's SSH port is published on `host:ssh_port`.
pub fn plan_run(project: &DevProject, options: &RunOptions) -> Result<RunContainerRequest> {
    let network = resolve_network_mode(&options.network)?;
    options.validate()?;

    let ports = if network == NetworkMode::Host {
        Vec::new()
    } else {
        vec![PortBinding {
            container_port: CONTAINER_SSH_PORT,
            host_port: options.ssh_port,
            host_ip: Some(bind_address(&options.host)?),
        }]
    };

    let mut planner = MountPlanner::new(
        project.image(),
        project.work_dir(),
        &options.home_dir,
        &options.user,
    );
    if let Some(socket) = &options.engine_socket {
        planner = planner.with_engine_socket(socket);
    }

    let mut request = RunContainerRequest::new(project.image(), project.container_name(), network);
    request.mounts = planner.materialize()?;
    request.env = options.env.clone();
    request.ports = ports;
    request.interactive = options.interactive;
    Ok(request)
}

/// Plan the run, then initialize `manager` and start the container.
///
/// The backend is not contacted when planning fails.
pub async fn launch(
    manager: Box<dyn ContainerManager>,
    project: &DevProject,
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Result<ContainerId> {
    let request = plan_run(project, options)?;
    let runner = DevRunner::connect(manager, cancel).await?;
    runner.run(&request, cancel).await
}

/// Drives an initialized backend for one project
pub struct DevRunner {
    manager: Box<dyn ContainerManager>,
}

impl DevRunner {
    /// Initialize `manager` and wrap it
    pub async fn connect(
        mut manager: Box<dyn ContainerManager>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        manager.init(cancel).await?;
        tracing::debug!("{} container manager ready", manager.provider_type());
        Ok(Self { manager })
    }

    pub fn provider_type(&self) -> ProviderType {
        self.manager.provider_type()
    }

    pub async fn run(
        &self,
        request: &RunContainerRequest,
        cancel: &CancellationToken,
    ) -> Result<ContainerId> {
        tracing::info!(
            "Starting container '{}' from {}",
            request.name,
            request.image
        );
        let id = self.manager.run_container(request, cancel).await?;
        tracing::info!("Container started '{}'", id.short());
        Ok(id)
    }

    pub async fn stop(&self, project: &DevProject, cancel: &CancellationToken) -> Result<()> {
        let name = project.container_name();
        tracing::info!("Stopping container '{}'", name);
        self.manager.stop_container(&name, cancel).await?;
        tracing::info!("Container '{}' removed", name);
        Ok(())
    }

    pub async fn logs(
        &self,
        project: &DevProject,
        sink: &mut LogSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = project.container_name();
        self.manager
            .print_container_logs(&name, sink, cancel)
            .await?;
        Ok(())
    }

    pub async fn image_labels(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Label>> {
        Ok(self.manager.image_labels(image, cancel).await?)
    }

    pub async fn load_image(
        &self,
        archive: ImageArchive,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::info!("Loading image archive");
        Ok(self.manager.load_image(archive, cancel).await?)
    }
}
