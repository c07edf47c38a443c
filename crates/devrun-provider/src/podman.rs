//! Podman container manager driving the `podman` CLI
//!
//! Podman reports logs on two pipes (stdout and stderr) while the process
//! exit is the only signal that the history has been fully replayed, so log
//! printing goes through [`crate::log_drain`].

use crate::expand::{env_assignment, expand_mount};
use crate::log_drain::{drain_streams, DEFAULT_LOG_QUEUE};
use crate::{
    cancellable, sorted_labels, ContainerId, ContainerManager, ImageArchive, Label, LogSink,
    NetworkMode, ProviderError, ProviderType, Result, RunContainerRequest, DEV_CAPABILITIES,
    SECCOMP_UNCONFINED,
};
use async_trait::async_trait;
use devrun_config::PodmanConfig;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Podman manager using the podman command line
pub struct PodmanManager {
    config: PodmanConfig,
    /// Client version reported by `init`
    version: Option<String>,
}

impl PodmanManager {
    /// Create an unconnected manager; call `init` before use
    pub fn new(config: PodmanConfig) -> Self {
        Self {
            config,
            version: None,
        }
    }

    fn ensure_init(&self) -> Result<()> {
        match self.version {
            Some(_) => Ok(()),
            None => Err(ProviderError::NotInitialized),
        }
    }

    /// Build a podman command, killed if the future driving it is dropped
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.program);
        if let Some(ref url) = self.config.url {
            cmd.arg(format!("--url={}", url));
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run a podman command and return its stdout
    async fn run_cmd(
        &self,
        action: &str,
        target: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String> {
        tracing::debug!("podman {}", args.join(" "));
        let mut cmd = self.build_command();
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cancellable(cancel, async {
            cmd.output().await.map_err(|e| {
                ProviderError::RuntimeError(format!("cannot run '{}': {}", self.config.program, e))
            })
        })
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(podman_error(action, target, &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn container_exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        let mut cmd = self.build_command();
        cmd.args(["container", "exists", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = cancellable(cancel, async {
            cmd.output().await.map_err(ProviderError::from)
        })
        .await?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(podman_error(
                "look up container",
                name,
                &String::from_utf8_lossy(&output.stderr),
            )),
        }
    }
}

/// Classify a failed podman invocation by its stderr
fn podman_error(action: &str, target: &str, stderr: &str) -> ProviderError {
    let message = stderr.trim();
    let lower = message.to_lowercase();
    if lower.contains("already in use") {
        ProviderError::NameConflict(target.to_string())
    } else if lower.contains("no such container") {
        ProviderError::ContainerNotFound(format!("{}: {}", target, message))
    } else if lower.contains("image not known") || lower.contains("no such image") {
        ProviderError::ImageNotFound(format!("{}: {}", target, message))
    } else {
        ProviderError::RuntimeError(format!("cannot {} '{}': {}", action, target, message))
    }
}

fn network_mode(mode: NetworkMode) -> Result<&'static str> {
    match mode {
        NetworkMode::Bridge => Ok("bridge"),
        NetworkMode::Host => Ok("host"),
        other => Err(ProviderError::Unsupported(format!(
            "network mode '{}' is not supported by podman",
            other
        ))),
    }
}

/// Arguments for `podman create` from a run request
fn create_args(request: &RunContainerRequest) -> Result<Vec<String>> {
    let mut args = vec!["create".to_string(), format!("--name={}", request.name)];

    for cap in DEV_CAPABILITIES {
        args.push(format!("--cap-add={}", cap));
    }
    args.push(format!("--security-opt={}", SECCOMP_UNCONFINED));
    args.push(format!("--network={}", network_mode(request.network_mode)?));

    if request.interactive {
        args.push("-t".to_string());
        args.push("-i".to_string());
    }

    for mount in request.mounts.iter().map(expand_mount) {
        // the --mount value is comma separated and has no quoting
        for path in [&mount.host_path, &mount.container_path] {
            if path.contains(',') {
                return Err(ProviderError::Unsupported(format!(
                    "mount path '{}' contains ','",
                    path
                )));
            }
        }
        let ro = if mount.read_only { ",ro=true" } else { "" };
        args.push(format!(
            "--mount=type=bind,source={},destination={}{}",
            mount.host_path, mount.container_path, ro
        ));
    }

    for port in &request.ports {
        let port_str = match port.host_ip {
            Some(ref ip) => format!("-p={}:{}:{}/tcp", ip, port.host_port, port.container_port),
            None => format!("-p={}:{}/tcp", port.host_port, port.container_port),
        };
        args.push(port_str);
    }

    for var in &request.env {
        args.push(format!("--env={}", env_assignment(var)));
    }

    args.push(request.image.clone());
    Ok(args)
}

#[async_trait]
impl ContainerManager for PodmanManager {
    async fn init(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut cmd = self.build_command();
        cmd.args(["version", "--format", "{{.Client.Version}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cancellable(cancel, async {
            cmd.output().await.map_err(|e| {
                ProviderError::ConnectionError(format!(
                    "cannot run '{}': {}",
                    self.config.program, e
                ))
            })
        })
        .await?;

        if !output.status.success() {
            return Err(ProviderError::ConnectionError(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("Using podman {}", version);
        self.version = Some(version);
        Ok(())
    }

    async fn load_image(
        &self,
        mut archive: ImageArchive,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.ensure_init()?;

        let mut cmd = self.build_command();
        cmd.arg("load")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cancellable(cancel, async {
            let mut child = cmd.spawn()?;
            let mut stdin = child.stdin.take().ok_or_else(|| {
                ProviderError::RuntimeError("podman load has no stdin".to_string())
            })?;

            let feed = async move {
                let copied = tokio::io::copy(&mut archive, &mut stdin).await;
                let closed = stdin.shutdown().await;
                copied.and(closed)
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            // A write error is only interesting when podman itself succeeded
            if output.status.success() {
                fed?;
            }
            Ok(output)
        })
        .await?;

        if !output.status.success() {
            return Err(podman_error(
                "load",
                "image archive",
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        tracing::debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    async fn image_labels(&self, image: &str, cancel: &CancellationToken) -> Result<Vec<Label>> {
        self.ensure_init()?;

        let args = [
            "image".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .Labels}}".to_string(),
            image.to_string(),
        ];
        let output = self.run_cmd("inspect image", image, &args, cancel).await?;

        let labels: Option<HashMap<String, String>> =
            serde_json::from_str(output.trim()).map_err(|e| {
                ProviderError::RuntimeError(format!(
                    "cannot parse labels of image '{}': {}",
                    image, e
                ))
            })?;

        Ok(sorted_labels(labels.unwrap_or_default()))
    }

    async fn run_container(
        &self,
        request: &RunContainerRequest,
        cancel: &CancellationToken,
    ) -> Result<ContainerId> {
        self.ensure_init()?;

        let args = create_args(request)?;
        let output = self
            .run_cmd("create container from image", &request.image, &args, cancel)
            .await
            .map_err(|e| match e {
                // The container name is the target of a conflict, not the image
                ProviderError::NameConflict(_) => ProviderError::NameConflict(request.name.clone()),
                e => e,
            })?;
        let id = ContainerId::new(output.trim());
        tracing::debug!("Created container {} ({})", request.name, id.short());

        let args = ["start".to_string(), request.name.clone()];
        self.run_cmd("start container", &request.name, &args, cancel)
            .await?;

        Ok(id)
    }

    async fn stop_container(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.ensure_init()?;

        let args = ["stop".to_string(), name.to_string()];
        self.run_cmd("stop container", name, &args, cancel).await?;

        let args = [
            "rm".to_string(),
            "--volumes".to_string(),
            name.to_string(),
        ];
        self.run_cmd("remove container", name, &args, cancel).await?;

        tracing::debug!("Removed container {} and its volumes", name);
        Ok(())
    }

    async fn print_container_logs(
        &self,
        name: &str,
        sink: &mut LogSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.ensure_init()?;

        if !self.container_exists(name, cancel).await? {
            return Err(ProviderError::ContainerNotFound(name.to_string()));
        }

        let mut cmd = self.build_command();
        cmd.args(["logs", "--timestamps", name])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let summary = cancellable(cancel, async {
            let mut child = cmd.spawn()?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| ProviderError::LogStream("podman logs has no stdout".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| ProviderError::LogStream("podman logs has no stderr".to_string()))?;

            let completion = async {
                let status = child.wait().await?;
                if status.success() {
                    Ok(())
                } else {
                    Err(ProviderError::LogStream(format!(
                        "podman logs for '{}' exited with {}",
                        name, status
                    )))
                }
            };

            drain_streams(stdout, stderr, completion, sink, DEFAULT_LOG_QUEUE).await
        })
        .await?;

        tracing::debug!(
            "Printed {} log chunks ({} bytes) for {}",
            summary.chunks,
            summary.bytes,
            name
        );
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Podman
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnvironmentVariable, MountPoint, PortBinding};

    fn request() -> RunContainerRequest {
        let mut request = RunContainerRequest::new("demo", "demo_app", NetworkMode::Host);
        request.mounts = vec![
            MountPoint::new("/proj/app", "/work"),
            MountPoint {
                host_path: "/home/me/.ssh".to_string(),
                container_path: "/home/user/.ssh".to_string(),
                read_only: true,
            },
        ];
        request.env = vec![EnvironmentVariable::new("EDITOR", "vim")];
        request
    }

    #[test]
    fn test_create_args_layout() {
        let args = create_args(&request()).unwrap();
        assert_eq!(args[0], "create");
        assert_eq!(args[1], "--name=demo_app");
        assert_eq!(args.last().map(String::as_str), Some("demo"));
        assert!(args.contains(&"--network=host".to_string()));
        assert!(args.contains(&"--env=EDITOR=vim".to_string()));
        assert!(!args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_create_args_mounts_preserve_read_only() {
        let args = create_args(&request()).unwrap();
        assert!(args.contains(&"--mount=type=bind,source=/proj/app,destination=/work".to_string()));
        assert!(args.contains(
            &"--mount=type=bind,source=/home/me/.ssh,destination=/home/user/.ssh,ro=true"
                .to_string()
        ));
    }

    #[test]
    fn test_create_args_rejects_comma_in_mount_path() {
        let mut host_comma = request();
        host_comma.mounts.push(MountPoint::new("/proj/a,b", "/data"));
        let err = create_args(&host_comma).unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(ref m) if m.contains("/proj/a,b")));

        let mut target_comma = request();
        target_comma.mounts = vec![MountPoint::new("/proj/app", "/work,ro")];
        assert!(create_args(&target_comma).is_err());
    }

    #[test]
    fn test_create_args_keeps_equals_in_mount_path() {
        let mut request = request();
        request.mounts = vec![MountPoint::new("/proj/k=v", "/work")];
        let args = create_args(&request).unwrap();
        assert!(args.contains(&"--mount=type=bind,source=/proj/k=v,destination=/work".to_string()));
    }

    #[test]
    fn test_create_args_security_posture() {
        let args = create_args(&request()).unwrap();
        for cap in ["CAP_AUDIT_WRITE", "SYS_PTRACE", "NET_RAW", "NET_ADMIN"] {
            assert!(args.contains(&format!("--cap-add={}", cap)));
        }
        assert!(args.contains(&"--security-opt=seccomp=unconfined".to_string()));
    }

    #[test]
    fn test_create_args_ports() {
        let mut request = request();
        request.network_mode = NetworkMode::Bridge;
        request.ports = vec![
            PortBinding {
                container_port: 22,
                host_port: 2221,
                host_ip: Some("localhost".to_string()),
            },
            PortBinding {
                container_port: 8080,
                host_port: 18080,
                host_ip: None,
            },
        ];
        let args = create_args(&request).unwrap();
        assert!(args.contains(&"-p=localhost:2221:22/tcp".to_string()));
        assert!(args.contains(&"-p=18080:8080/tcp".to_string()));
    }

    #[test]
    fn test_nat_unsupported() {
        let mut request = request();
        request.network_mode = NetworkMode::Nat;
        let err = create_args(&request).unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn test_error_classification() {
        let err = podman_error(
            "create container from image",
            "demo_app",
            "Error: creating container storage: the container name \"demo_app\" is already in use by abc",
        );
        assert!(matches!(err, ProviderError::NameConflict(ref n) if n == "demo_app"));

        let err = podman_error("stop container", "demo_app", "Error: no such container demo_app");
        assert!(matches!(err, ProviderError::ContainerNotFound(_)));

        let err = podman_error("inspect image", "demo", "Error: demo: image not known");
        assert!(matches!(err, ProviderError::ImageNotFound(_)));

        let err = podman_error("stop container", "demo_app", "Error: permission denied\n");
        assert_eq!(
            err.to_string(),
            "Container runtime error: cannot stop container 'demo_app': Error: permission denied"
        );
    }

    #[tokio::test]
    async fn test_init_fails_for_missing_program() {
        let mut manager = PodmanManager::new(PodmanConfig {
            program: "/nonexistent/podman-for-tests".to_string(),
            url: None,
        });
        let err = manager.init(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ConnectionError(_)));
    }
}
