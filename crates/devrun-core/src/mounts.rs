//! Bind mount planning for the dev container
//!
//! The plan is an ordered table of [`MountRule`]s. Required entries are
//! created on the host if missing, optional ones are mounted only when they
//! already exist. The work directory always comes first.

use crate::fs::{ensure_dir, ensure_file, is_dir, is_file};
use crate::naming::dev_home_dir;
use crate::{CoreError, Result};
use devrun_provider::MountPoint;
use std::path::{Path, PathBuf};

/// Where the project work directory is mounted
pub const WORK_DIR_TARGET: &str = "/work";

/// Engine socket passed through when present on the host
pub const DEFAULT_ENGINE_SOCKET: &str = "/var/run/docker.sock";

/// Per-project directories under the container user's home
pub const DEV_HOME_DIRS: [&str; 7] = [".cache", ".config", ".java", ".jdks", ".local", ".m2", "go"];

/// Per-project files under the container user's home
pub const DEV_HOME_FILES: [&str; 1] = [".bash_history"];

/// Host directories shared from the invoking user's home
pub const SHARED_HOME_DIRS: [&str; 2] = [".ssh", ".docker"];

/// Host files shared from the invoking user's home
pub const SHARED_HOME_FILES: [&str; 1] = [".gitconfig"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Directory, created if missing
    RequiredDir,
    /// File, created empty if missing
    RequiredFile,
    /// Directory, skipped if missing
    OptionalDir,
    /// File, skipped if missing
    OptionalFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRule {
    pub host_path: PathBuf,
    pub container_path: String,
    pub kind: MountKind,
    /// Mount without write access; the built-in table has none
    pub read_only: bool,
}

impl MountRule {
    fn new(
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
        kind: MountKind,
    ) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            kind,
            read_only: false,
        }
    }

    fn mount_point(&self) -> MountPoint {
        MountPoint {
            host_path: host_path_string(&self.host_path),
            container_path: self.container_path.clone(),
            read_only: self.read_only,
        }
    }
}

/// Builds the bind mount list for one project
#[derive(Debug, Clone)]
pub struct MountPlanner {
    image_tag: String,
    work_dir: PathBuf,
    home_dir: PathBuf,
    user: String,
    engine_socket: PathBuf,
}

impl MountPlanner {
    pub fn new(
        image_tag: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            image_tag: image_tag.into(),
            work_dir: work_dir.into(),
            home_dir: home_dir.into(),
            user: user.into(),
            engine_socket: PathBuf::from(DEFAULT_ENGINE_SOCKET),
        }
    }

    /// Use a different host engine socket
    pub fn with_engine_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_socket = path.into();
        self
    }

    pub fn dev_home_dir(&self) -> PathBuf {
        dev_home_dir(&self.image_tag, &self.work_dir)
    }

    /// Home directory of the user inside the container
    pub fn container_home(&self) -> String {
        format!("/home/{}", self.user)
    }

    fn in_container_home(&self, name: &str) -> String {
        format!("{}/{}", self.container_home(), name)
    }

    /// `base/name` on the host onto `name` in the container home
    fn home_rule(&self, base: &Path, name: &str, kind: MountKind) -> MountRule {
        MountRule::new(base.join(name), self.in_container_home(name), kind)
    }

    /// The ordered rule table, without touching the filesystem
    pub fn rules(&self) -> Vec<MountRule> {
        let dev_home = self.dev_home_dir();
        let mut rules = vec![MountRule::new(
            &self.work_dir,
            WORK_DIR_TARGET,
            MountKind::RequiredDir,
        )];

        for name in DEV_HOME_DIRS {
            rules.push(self.home_rule(&dev_home, name, MountKind::RequiredDir));
        }
        for name in DEV_HOME_FILES {
            rules.push(self.home_rule(&dev_home, name, MountKind::RequiredFile));
        }
        for name in SHARED_HOME_DIRS {
            rules.push(self.home_rule(&self.home_dir, name, MountKind::OptionalDir));
        }
        for name in SHARED_HOME_FILES {
            rules.push(self.home_rule(&self.home_dir, name, MountKind::OptionalFile));
        }
        rules.push(MountRule::new(
            &self.engine_socket,
            DEFAULT_ENGINE_SOCKET,
            MountKind::OptionalFile,
        ));
        rules
    }

    /// Create missing required paths and return the mounts to request.
    ///
    /// Stops at the first required path that cannot be created.
    pub fn materialize(&self) -> Result<Vec<MountPoint>> {
        let mut mounts = Vec::new();
        for rule in self.rules() {
            let path = rule.host_path.as_path();
            match rule.kind {
                MountKind::RequiredDir => {
                    ensure_dir(path).map_err(|source| CoreError::RequiredDir {
                        path: path.to_path_buf(),
                        source,
                    })?;
                }
                MountKind::RequiredFile => {
                    if ensure_file(path).map_err(|source| CoreError::RequiredFile {
                        path: path.to_path_buf(),
                        source,
                    })? {
                        tracing::debug!("Created {}", path.display());
                    }
                }
                MountKind::OptionalDir if !is_dir(path) => {
                    tracing::debug!("Skipping mount of missing directory {}", path.display());
                    continue;
                }
                MountKind::OptionalFile if !is_file(path) => {
                    tracing::debug!("Skipping mount of missing file {}", path.display());
                    continue;
                }
                MountKind::OptionalDir | MountKind::OptionalFile => {}
            }
            mounts.push(rule.mount_point());
        }
        Ok(mounts)
    }
}

fn host_path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
