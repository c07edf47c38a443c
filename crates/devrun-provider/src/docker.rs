//! Docker container manager using bollard

use crate::expand::{env_assignment, expand_mount};
use crate::{
    cancellable, sorted_labels, ContainerId, ContainerManager, ImageArchive, Label, LogSink,
    NetworkMode, ProviderError, ProviderType, Result, RunContainerRequest, DEV_CAPABILITIES,
    SECCOMP_UNCONFINED,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::ImportImageOptions;
use bollard::service::{HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::Docker;
use devrun_config::DockerConfig;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Docker manager talking to the engine API
pub struct DockerManager {
    config: DockerConfig,
    client: Option<Docker>,
}

impl DockerManager {
    /// Create an unconnected manager; call `init` before use
    pub fn new(config: DockerConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn client(&self) -> Result<&Docker> {
        self.client.as_ref().ok_or(ProviderError::NotInitialized)
    }
}

/// Connect to the configured socket, or to `DOCKER_HOST` / the platform default
fn connect(socket: Option<&str>) -> Result<Docker> {
    let client = match socket {
        None => Docker::connect_with_local_defaults(),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Docker::connect_with_http(url, 120, bollard::API_DEFAULT_VERSION)
        }
        Some(path) => Docker::connect_with_socket(
            path.trim_start_matches("unix://"),
            120,
            bollard::API_DEFAULT_VERSION,
        ),
    };
    client.map_err(|e| ProviderError::ConnectionError(e.to_string()))
}

/// What a failed request was about, for mapping HTTP 404
#[derive(Clone, Copy)]
enum Target<'a> {
    Image(&'a str),
    Container(&'a str),
}

fn docker_error(action: &str, target: Target<'_>, err: BollardError) -> ProviderError {
    match (target, err) {
        (
            Target::Image(name),
            BollardError::DockerResponseServerError { status_code: 404, message },
        ) => ProviderError::ImageNotFound(format!("{}: {}", name, message)),
        (
            Target::Container(name),
            BollardError::DockerResponseServerError { status_code: 404, message },
        ) => ProviderError::ContainerNotFound(format!("{}: {}", name, message)),
        (Target::Image(name) | Target::Container(name), err) => {
            ProviderError::RuntimeError(format!("cannot {} '{}': {}", action, name, err))
        }
    }
}

fn network_mode(mode: NetworkMode) -> Result<&'static str> {
    match mode {
        NetworkMode::Bridge => Ok("bridge"),
        NetworkMode::Host => Ok("host"),
        // The nat driver only exists on Windows engines
        #[cfg(windows)]
        NetworkMode::Nat => Ok("nat"),
        #[allow(unreachable_patterns)]
        other => Err(ProviderError::Unsupported(format!(
            "network mode '{}' is not supported by docker",
            other
        ))),
    }
}

/// Translate a run request into a bollard container config
fn container_config(request: &RunContainerRequest) -> Result<Config<String>> {
    let mounts: Vec<Mount> = request
        .mounts
        .iter()
        .map(expand_mount)
        .map(|m| Mount {
            target: Some(m.container_path),
            source: Some(m.host_path),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    for port in &request.ports {
        let container_port = format!("{}/tcp", port.container_port);
        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: Some(port.host_port.to_string()),
            }]),
        );
    }

    let env: Vec<String> = request.env.iter().map(env_assignment).collect();

    let host_config = HostConfig {
        mounts: if mounts.is_empty() {
            None
        } else {
            Some(mounts)
        },
        port_bindings: if port_bindings.is_empty() {
            None
        } else {
            Some(port_bindings)
        },
        network_mode: Some(network_mode(request.network_mode)?.to_string()),
        cap_add: Some(DEV_CAPABILITIES.iter().map(|c| c.to_string()).collect()),
        security_opt: Some(vec![SECCOMP_UNCONFINED.to_string()]),
        ..Default::default()
    };

    Ok(Config {
        image: Some(request.image.clone()),
        env: if env.is_empty() { None } else { Some(env) },
        tty: Some(request.interactive),
        open_stdin: Some(request.interactive),
        exposed_ports: if exposed_ports.is_empty() {
            None
        } else {
            Some(exposed_ports)
        },
        host_config: Some(host_config),
        ..Default::default()
    })
}

fn log_bytes(output: LogOutput) -> Vec<u8> {
    match output {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => message.to_vec(),
    }
}

#[async_trait]
impl ContainerManager for DockerManager {
    async fn init(&mut self, cancel: &CancellationToken) -> Result<()> {
        let client = connect(self.config.socket.as_deref())?;

        cancellable(cancel, async {
            client
                .ping()
                .await
                .map_err(|e| ProviderError::ConnectionError(e.to_string()))
        })
        .await?;

        tracing::debug!("Connected to docker engine");
        self.client = Some(client);
        Ok(())
    }

    async fn load_image(
        &self,
        mut archive: ImageArchive,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let client = self.client()?;

        cancellable(cancel, async {
            let mut data = Vec::new();
            archive.read_to_end(&mut data).await?;
            tracing::debug!("Importing {} byte image archive", data.len());

            let options = ImportImageOptions {
                quiet: true,
                ..Default::default()
            };
            let mut stream = client.import_image(options, data.into(), None);
            while let Some(result) = stream.next().await {
                let info = result.map_err(|e| {
                    ProviderError::RuntimeError(format!("cannot load image: {}", e))
                })?;
                if let Some(error) = info.error {
                    return Err(ProviderError::RuntimeError(format!(
                        "cannot load image: {}",
                        error
                    )));
                }
                if let Some(line) = info.stream {
                    tracing::debug!("{}", line.trim());
                }
            }
            Ok(())
        })
        .await
    }

    async fn image_labels(&self, image: &str, cancel: &CancellationToken) -> Result<Vec<Label>> {
        let client = self.client()?;

        let inspect = cancellable(cancel, async {
            client
                .inspect_image(image)
                .await
                .map_err(|e| docker_error("inspect image", Target::Image(image), e))
        })
        .await?;

        Ok(sorted_labels(
            inspect.config.and_then(|c| c.labels).unwrap_or_default(),
        ))
    }

    async fn run_container(
        &self,
        request: &RunContainerRequest,
        cancel: &CancellationToken,
    ) -> Result<ContainerId> {
        let client = self.client()?;
        let config = container_config(request)?;
        let options = CreateContainerOptions {
            name: request.name.as_str(),
            platform: None,
        };

        let response = cancellable(cancel, async {
            client
                .create_container(Some(options), config)
                .await
                .map_err(|e| match e {
                    BollardError::DockerResponseServerError {
                        status_code: 409, ..
                    } => ProviderError::NameConflict(request.name.clone()),
                    e => docker_error(
                        "create container from image",
                        Target::Image(&request.image),
                        e,
                    ),
                })
        })
        .await?;

        for warning in &response.warnings {
            tracing::warn!("{}", warning);
        }
        let id = ContainerId::new(response.id);
        tracing::debug!("Created container {} ({})", request.name, id.short());

        cancellable(cancel, async {
            client
                .start_container(&id.0, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| docker_error("start container", Target::Container(&request.name), e))
        })
        .await?;

        Ok(id)
    }

    async fn stop_container(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let client = self.client()?;

        cancellable(cancel, async {
            match client
                .stop_container(name, None::<StopContainerOptions>)
                .await
            {
                Ok(()) => Ok(()),
                // Already stopped
                Err(BollardError::DockerResponseServerError {
                    status_code: 304, ..
                }) => Ok(()),
                Err(e) => Err(docker_error("stop container", Target::Container(name), e)),
            }
        })
        .await?;

        let options = RemoveContainerOptions {
            v: true,
            ..Default::default()
        };
        cancellable(cancel, async {
            client
                .remove_container(name, Some(options))
                .await
                .map_err(|e| docker_error("remove container", Target::Container(name), e))
        })
        .await?;

        tracing::debug!("Removed container {} and its volumes", name);
        Ok(())
    }

    async fn print_container_logs(
        &self,
        name: &str,
        sink: &mut LogSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let client = self.client()?;
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        cancellable(cancel, async {
            let mut stream = client.logs(name, Some(options));
            while let Some(chunk) = stream.next().await {
                let output =
                    chunk.map_err(|e| docker_error("read logs of", Target::Container(name), e))?;
                sink.write_all(&log_bytes(output)).await?;
            }
            sink.flush().await?;
            Ok(())
        })
        .await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Docker
    }
}
