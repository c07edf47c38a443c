//! Container manager contract and backend adapters for dev-runner
//!
//! This crate provides one backend-neutral [`ContainerManager`] trait with a
//! Docker implementation (bollard, over the engine API) and a Podman
//! implementation (driving the `podman` CLI). [`create_manager`] is the only
//! place that picks one by name.

mod docker;
mod error;
pub mod expand;
pub mod log_drain;
mod podman;
mod types;

pub use docker::DockerManager;
pub use error::*;
pub use podman::PodmanManager;
pub use types::*;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Capabilities granted to every dev container (debuggers, packet capture)
pub const DEV_CAPABILITIES: [&str; 4] = ["CAP_AUDIT_WRITE", "SYS_PTRACE", "NET_RAW", "NET_ADMIN"];

/// Security option disabling the default seccomp profile
pub const SECCOMP_UNCONFINED: &str = "seccomp=unconfined";

/// Image archive handed to [`ContainerManager::load_image`]
pub type ImageArchive = Pin<Box<dyn AsyncRead + Send>>;

/// Destination for [`ContainerManager::print_container_logs`]
pub type LogSink = dyn AsyncWrite + Send + Unpin;

/// Lifecycle operations on the single project container.
///
/// `init` must be called before anything else. Every call observes `cancel`
/// and returns [`ProviderError::Cancelled`] once it fires.
#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Connect to the backend
    async fn init(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Import an image archive into the backend's local store
    async fn load_image(&self, archive: ImageArchive, cancel: &CancellationToken) -> Result<()>;

    /// Read the labels of a local image, sorted by name
    async fn image_labels(&self, image: &str, cancel: &CancellationToken) -> Result<Vec<Label>>;

    /// Create and start a container.
    ///
    /// Fails with [`ProviderError::NameConflict`] when a container with the
    /// requested name already exists; nothing is reused or replaced.
    async fn run_container(
        &self,
        request: &RunContainerRequest,
        cancel: &CancellationToken,
    ) -> Result<ContainerId>;

    /// Stop a container, then remove it together with its volumes
    async fn stop_container(&self, name: &str, cancel: &CancellationToken) -> Result<()>;

    /// Write the full timestamped stdout+stderr history to `sink`
    async fn print_container_logs(
        &self,
        name: &str,
        sink: &mut LogSink,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Backend this manager talks to
    fn provider_type(&self) -> ProviderType;
}

/// Create an uninitialized manager for the named backend
pub fn create_manager(
    name: &str,
    config: &devrun_config::GlobalConfig,
) -> Result<Box<dyn ContainerManager>> {
    let provider_type: ProviderType = name
        .parse()
        .map_err(|_| ProviderError::UnknownBackend(name.to_string()))?;

    tracing::debug!("Selected {} container manager", provider_type);
    match provider_type {
        ProviderType::Docker => Ok(Box::new(DockerManager::new(
            config.providers.docker.clone(),
        ))),
        ProviderType::Podman => Ok(Box::new(PodmanManager::new(
            config.providers.podman.clone(),
        ))),
    }
}

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = fut => result,
    }
}

/// Sort labels by name so output does not depend on map iteration order
pub(crate) fn sorted_labels<I>(labels: I) -> Vec<Label>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut labels: Vec<Label> = labels
        .into_iter()
        .map(|(name, value)| Label { name, value })
        .collect();
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use devrun_config::GlobalConfig;

    #[test]
    fn test_factory_selects_by_name() {
        let config = GlobalConfig::default();
        let docker = create_manager("docker", &config).unwrap();
        assert_eq!(docker.provider_type(), ProviderType::Docker);

        let podman = create_manager("PODMAN", &config).unwrap();
        assert_eq!(podman.provider_type(), ProviderType::Podman);
    }

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let err = create_manager("containerd", &GlobalConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::UnknownBackend(ref name) if name == "containerd"));
        assert_eq!(
            err.to_string(),
            "Container manager 'containerd' is not supported"
        );
    }

    #[tokio::test]
    async fn test_cancellable_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn test_calls_before_init_fail() {
        let config = GlobalConfig::default();
        let cancel = CancellationToken::new();
        for backend in ["docker", "podman"] {
            let manager = create_manager(backend, &config).unwrap();
            let err = manager.stop_container("demo_app", &cancel).await.unwrap_err();
            assert!(matches!(err, ProviderError::NotInitialized), "{}", backend);
        }
    }

    #[test]
    fn test_labels_sorted() {
        let labels = sorted_labels(vec![
            ("version".to_string(), "1.0".to_string()),
            ("maintainer".to_string(), "dev".to_string()),
        ]);
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["maintainer", "version"]);
    }
}
