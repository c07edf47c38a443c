//! Global configuration for dev-runner
//!
//! Located at `~/.config/dev-runner/config.toml`, or inside the directory named
//! by `DEVRUN_CONFIG_DIR` when that variable is set.

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the config directory
pub const CONFIG_DIR_ENV: &str = "DEVRUN_CONFIG_DIR";

/// Global dev-runner configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
    pub providers: ProvidersConfig,
}

/// Defaults applied when a flag is omitted on the command line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Container backend ("docker" or "podman")
    pub backend: String,
    /// Username inside the dev container
    pub user: String,
    /// Password of the container user, used by `attach`
    pub password: String,
    /// Host interface the container SSH port is bound to
    pub host: String,
    /// Host port the container SSH server is published on
    pub ssh_port: u16,
    /// Network mode ("bridge", "host" or "nat")
    pub network: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            backend: "docker".to_string(),
            user: "user".to_string(),
            password: "user".to_string(),
            host: "localhost".to_string(),
            ssh_port: 2221,
            network: "host".to_string(),
        }
    }
}

/// Backend-specific configurations
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub docker: DockerConfig,
    pub podman: PodmanConfig,
}

/// Docker-specific configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Daemon socket (`unix://`, `http://` or a bare path).
    /// When unset the `DOCKER_HOST` environment and platform defaults apply.
    pub socket: Option<String>,
}

/// Podman-specific configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PodmanConfig {
    /// Podman executable
    pub program: String,
    /// Remote service URL passed as `--url`.
    /// When unset podman reads `CONTAINER_HOST` itself.
    pub url: Option<String>,
}

impl Default for PodmanConfig {
    fn default() -> Self {
        Self {
            program: "podman".to_string(),
            url: None,
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            "Loaded config from {:?}: backend={}",
            path,
            config.defaults.backend
        );

        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir).join("config.toml"));
        }
        let dirs = ProjectDirs::from("", "", "dev-runner").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.defaults.backend, "docker");
        assert_eq!(config.defaults.user, "user");
        assert_eq!(config.defaults.ssh_port, 2221);
        assert_eq!(config.defaults.network, "host");
        assert_eq!(config.providers.podman.program, "podman");
        assert!(config.providers.docker.socket.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[defaults]
backend = "podman"
ssh_port = 2022

[providers.docker]
socket = "unix:///run/user/1000/docker.sock"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.defaults.backend, "podman");
        assert_eq!(config.defaults.ssh_port, 2022);
        // Unspecified keys keep their defaults
        assert_eq!(config.defaults.host, "localhost");
        assert_eq!(
            config.providers.docker.socket.as_deref(),
            Some("unix:///run/user/1000/docker.sock")
        );
        assert_eq!(config.providers.podman.program, "podman");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = GlobalConfig::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_load_invalid_toml_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[defaults\nbackend = ").unwrap();

        let err = GlobalConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_full_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[defaults]
backend = "podman"
user = "dev"
password = "dev"
host = "127.0.0.1"
ssh_port = 2022
network = "bridge"

[providers.podman]
program = "/usr/local/bin/podman"
url = "unix:///run/podman/podman.sock"
"#,
        )
        .unwrap();

        let config = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(config.defaults.user, "dev");
        assert_eq!(config.defaults.network, "bridge");
        assert_eq!(config.providers.podman.program, "/usr/local/bin/podman");
        assert_eq!(
            config.providers.podman.url.as_deref(),
            Some("unix:///run/podman/podman.sock")
        );
        assert!(config.providers.docker.socket.is_none());
    }
}
