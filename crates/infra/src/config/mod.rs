//! Configuration loading
//!
//! Layers defaults, an optional file and `SELLERSYNC_*` environment
//! variables into a validated [`sellersync_domain::Config`].

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_file, probe_config_paths};
