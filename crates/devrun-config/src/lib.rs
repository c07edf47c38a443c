//! Configuration for dev-runner
//!
//! Global settings live in `~/.config/dev-runner/config.toml` and provide the
//! defaults for every command line flag that is not given explicitly.

mod error;
mod global;

pub use error::*;
pub use global::*;
