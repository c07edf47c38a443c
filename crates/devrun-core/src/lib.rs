//! Core logic for dev-runner project containers
//!
//! This crate provides:
//! - Deterministic container and dev-home naming
//! - Bind mount planning with host path materialization
//! - Network mode policy
//! - The [`DevRunner`] lifecycle driver over any [`devrun_provider::ContainerManager`]
//! - SSH attach into a running container

mod error;
pub mod fs;
pub mod mounts;
pub mod naming;
pub mod network;
mod runner;
pub mod ssh;

pub use error::*;
pub use mounts::MountPlanner;
pub use network::{resolve_network_mode, NetworkModeError};
pub use runner::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
