//! Interactive SSH session into a running dev container
//!
//! The container's host key changes with every new container, so the stale
//! `known_hosts` entry for `[host]:port` is dropped before connecting. The
//! password is handed to `sshpass` through its environment variable so it
//! never shows up in the process list.

use crate::{CoreError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Environment variable read by `sshpass -e`
const SSHPASS_ENV: &str = "SSHPASS";

/// Where and as whom to log in
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl SshTarget {
    /// Host as it appears in `known_hosts`
    pub fn known_hosts_entry(&self) -> String {
        format!("[{}]:{}", self.host, self.port)
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `ssh-keygen` arguments removing the stale host key
    pub fn forget_host_args(&self, known_hosts: &Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            known_hosts.to_string_lossy().into_owned(),
            "-R".to_string(),
            self.known_hosts_entry(),
        ]
    }

    /// `sshpass` arguments for the interactive login
    pub fn connect_args(&self) -> Vec<String> {
        vec![
            "-e".to_string(),
            "ssh".to_string(),
            "-XY".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            self.destination(),
        ]
    }
}

/// `known_hosts` of the invoking user
pub fn known_hosts_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".ssh").join("known_hosts")
}

/// Open an interactive session with inherited stdio and wait for it to end
pub fn attach(target: &SshTarget, home_dir: &Path) -> Result<()> {
    let known_hosts = known_hosts_path(home_dir);
    if known_hosts.exists() {
        match Command::new("ssh-keygen")
            .args(target.forget_host_args(&known_hosts))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if !status.success() => {
                tracing::debug!("ssh-keygen -R exited with {}", status);
            }
            Err(e) => tracing::debug!("ssh-keygen unavailable: {}", e),
            Ok(_) => {}
        }
    }

    tracing::info!(
        "Connecting to {}:{} as {}",
        target.host,
        target.port,
        target.user
    );
    let status = Command::new("sshpass")
        .args(target.connect_args())
        .env(SSHPASS_ENV, &target.password)
        .status()
        .map_err(|e| CoreError::Attach(format!("cannot run sshpass: {}", e)))?;

    if !status.success() {
        return Err(CoreError::Attach(format!(
            "ssh to {} exited with {}",
            target.known_hosts_entry(),
            status
        )));
    }
    Ok(())
}
