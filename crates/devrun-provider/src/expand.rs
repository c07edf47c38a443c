//! Environment expansion applied when adapters translate a request
//!
//! This is the only place `$VAR` references are resolved. Unset variables
//! expand to the empty string.

use crate::{EnvironmentVariable, MountPoint};

/// Expand `$VAR` and `${VAR}` against the process environment
pub fn expand_env(input: &str) -> String {
    shellexpand::env_with_context_no_errors(input, |name| {
        Some(std::env::var(name).unwrap_or_default())
    })
    .into_owned()
}

/// `NAME=VALUE` assignment with both sides expanded
pub fn env_assignment(var: &EnvironmentVariable) -> String {
    format!("{}={}", expand_env(&var.name), expand_env(&var.value))
}

/// Mount with host and container paths expanded
pub fn expand_mount(mount: &MountPoint) -> MountPoint {
    MountPoint {
        host_path: expand_env(&mount.host_path),
        container_path: expand_env(&mount.container_path),
        read_only: mount.read_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_known_variable() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env("$PATH"), path);
        assert_eq!(expand_env("x:${PATH}:y"), format!("x:{}:y", path));
    }

    #[test]
    fn test_expand_unset_variable_is_empty() {
        assert_eq!(expand_env("a${DEVRUN_SURELY_UNSET_VARIABLE}b"), "ab");
    }

    #[test]
    fn test_expand_plain_text_untouched() {
        assert_eq!(expand_env("/home/user/.cache"), "/home/user/.cache");
    }

    #[test]
    fn test_env_assignment_expands_both_sides() {
        let path = std::env::var("PATH").unwrap_or_default();
        let var = EnvironmentVariable::new("HOST_PATH", "$PATH");
        assert_eq!(env_assignment(&var), format!("HOST_PATH={}", path));
    }

    #[test]
    fn test_expand_mount_keeps_read_only() {
        let mount = MountPoint {
            host_path: "${DEVRUN_SURELY_UNSET_VARIABLE}/src".to_string(),
            container_path: "/work".to_string(),
            read_only: true,
        };
        let expanded = expand_mount(&mount);
        assert_eq!(expanded.host_path, "/src");
        assert_eq!(expanded.container_path, "/work");
        assert!(expanded.read_only);
    }
}
