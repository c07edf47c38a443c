//! Backend-neutral types shared by every container manager

use serde::{Deserialize, Serialize};

/// Engine-assigned container ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        if self.0.len() > 12 {
            &self.0[..12]
        } else {
            &self.0
        }
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Container backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Docker,
    Podman,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Podman => write!(f, "podman"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

/// Container network mode.
///
/// Each backend supports a subset; a mode the backend cannot express is an
/// error at translation time, never remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Bridge,
    Host,
    Nat,
}

impl NetworkMode {
    /// Every mode, in the order they are offered to users
    pub const ALL: [NetworkMode; 3] = [Self::Bridge, Self::Host, Self::Nat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Host => "host",
            Self::Nat => "nat",
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bind mount from the host into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

impl MountPoint {
    pub fn new(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
        }
    }
}

/// Environment variable passed to the container.
///
/// `$VAR` references in name and value are expanded against the invoking
/// process environment when an adapter translates the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::str::FromStr for EnvironmentVariable {
    type Err = String;

    /// Parse `NAME=VALUE`; the value may be empty and may contain `=`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self::new(name, value)),
            _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
        }
    }
}

/// Published container port (TCP)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: u16,
    /// Host interface to bind to; all interfaces when unset
    pub host_ip: Option<String>,
}

/// Image label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// Everything a backend needs to create and start the dev container
#[derive(Debug, Clone)]
pub struct RunContainerRequest {
    /// Image to run
    pub image: String,
    /// Container name; must not already exist
    pub name: String,
    /// Bind mounts, container paths unique
    pub mounts: Vec<MountPoint>,
    /// Environment variables
    pub env: Vec<EnvironmentVariable>,
    /// Published ports
    pub ports: Vec<PortBinding>,
    /// Network mode
    pub network_mode: NetworkMode,
    /// Allocate a TTY and keep stdin open
    pub interactive: bool,
}

impl RunContainerRequest {
    pub fn new(
        image: impl Into<String>,
        name: impl Into<String>,
        network_mode: NetworkMode,
    ) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            mounts: Vec::new(),
            env: Vec::new(),
            ports: Vec::new(),
            network_mode,
            interactive: false,
        }
    }
}
