//! Network mode policy

use devrun_provider::NetworkMode;
use thiserror::Error;

/// Mode reported as the fallback when a requested one is rejected
pub const FALLBACK_NETWORK_MODE: NetworkMode = NetworkMode::Host;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("incorrect network mode '{value}' (expected one of: bridge, host, nat)")]
pub struct NetworkModeError {
    pub value: String,
    pub fallback: NetworkMode,
}

/// Map a requested mode name onto [`NetworkMode`]. Matching is exact.
pub fn resolve_network_mode(value: &str) -> Result<NetworkMode, NetworkModeError> {
    NetworkMode::ALL
        .into_iter()
        .find(|mode| mode.as_str() == value)
        .ok_or_else(|| NetworkModeError {
            value: value.to_string(),
            fallback: FALLBACK_NETWORK_MODE,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_modes() {
        assert_eq!(resolve_network_mode("bridge").unwrap(), NetworkMode::Bridge);
        assert_eq!(resolve_network_mode("host").unwrap(), NetworkMode::Host);
        assert_eq!(resolve_network_mode("nat").unwrap(), NetworkMode::Nat);
    }

    #[test]
    fn test_unknown_mode_reports_fallback() {
        for value in ["overlay", "", "Bridge", " host"] {
            let err = resolve_network_mode(value).unwrap_err();
            assert_eq!(err.value, value);
            assert_eq!(err.fallback, NetworkMode::Host);
            assert!(err.to_string().contains(&format!("'{}'", value)));
        }
    }
}
