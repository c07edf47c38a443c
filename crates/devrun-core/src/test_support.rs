//! Test support utilities for devrun-core
//!
//! Provides [`MockManager`], an in-memory [`ContainerManager`] that records
//! every call and keeps a container inventory, so the runner can be tested
//! without a real Docker/Podman engine.

use async_trait::async_trait;
use devrun_provider::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Init,
    LoadImage { bytes: usize },
    ImageLabels { image: String },
    Run { image: String, name: String },
    Stop { name: String },
    Logs { name: String },
}

/// Configurable mock container manager for testing
pub struct MockManager {
    pub provider_type: ProviderType,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    /// Running containers by name
    pub inventory: Arc<Mutex<HashMap<String, ContainerId>>>,
    /// Every request handed to `run_container`
    pub requests: Arc<Mutex<Vec<RunContainerRequest>>>,
    /// Labels per image; unknown images are `ImageNotFound`
    pub labels: Arc<Mutex<HashMap<String, Vec<Label>>>>,
    /// Bytes written by `print_container_logs`
    pub log_output: Arc<Mutex<String>>,
    /// When set, `init` fails with a connection error carrying this message
    pub init_error: Arc<Mutex<Option<String>>>,
    initialized: bool,
    next_id: Arc<Mutex<u64>>,
}

impl MockManager {
    /// Create a new mock manager with an empty inventory
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            calls: Arc::new(Mutex::new(Vec::new())),
            inventory: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            labels: Arc::new(Mutex::new(HashMap::new())),
            log_output: Arc::new(Mutex::new(String::new())),
            init_error: Arc::new(Mutex::new(None)),
            initialized: false,
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the containers currently in the inventory, sorted
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inventory.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn check(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.initialized {
            return Err(ProviderError::NotInitialized);
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerManager for MockManager {
    async fn init(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.record(MockCall::Init);
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        if let Some(message) = self.init_error.lock().unwrap().clone() {
            return Err(ProviderError::ConnectionError(message));
        }
        self.initialized = true;
        Ok(())
    }

    async fn load_image(
        &self,
        mut archive: ImageArchive,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.check(cancel)?;
        let mut data = Vec::new();
        archive.read_to_end(&mut data).await?;
        self.record(MockCall::LoadImage { bytes: data.len() });
        Ok(())
    }

    async fn image_labels(&self, image: &str, cancel: &CancellationToken) -> Result<Vec<Label>> {
        self.check(cancel)?;
        self.record(MockCall::ImageLabels {
            image: image.to_string(),
        });
        self.labels
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .ok_or_else(|| ProviderError::ImageNotFound(image.to_string()))
    }

    async fn run_container(
        &self,
        request: &RunContainerRequest,
        cancel: &CancellationToken,
    ) -> Result<ContainerId> {
        self.check(cancel)?;
        self.record(MockCall::Run {
            image: request.image.clone(),
            name: request.name.clone(),
        });
        self.requests.lock().unwrap().push(request.clone());

        let mut inventory = self.inventory.lock().unwrap();
        if inventory.contains_key(&request.name) {
            return Err(ProviderError::NameConflict(request.name.clone()));
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = ContainerId::new(format!("mock{:060}", *next_id));
        *next_id += 1;
        inventory.insert(request.name.clone(), id.clone());
        Ok(id)
    }

    async fn stop_container(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.check(cancel)?;
        self.record(MockCall::Stop {
            name: name.to_string(),
        });
        self.inventory
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::ContainerNotFound(name.to_string()))
    }

    async fn print_container_logs(
        &self,
        name: &str,
        sink: &mut LogSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.check(cancel)?;
        self.record(MockCall::Logs {
            name: name.to_string(),
        });
        if !self.inventory.lock().unwrap().contains_key(name) {
            return Err(ProviderError::ContainerNotFound(name.to_string()));
        }
        let output = self.log_output.lock().unwrap().clone();
        sink.write_all(output.as_bytes()).await?;
        sink.flush().await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }
}
