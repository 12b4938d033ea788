//! Configuration loading, env substitution and validation.
//!
//! Config files: `cortex.toml`, `cortex.yaml`, or `cortex.json`
//! Searched in `./` then `~/.config/cortex/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config},
    schema::{ActuatorConfig, CortexConfig, FlowdockConfig, HttpConfig, WitConfig},
    validate::{anchor_pattern, validate},
};
